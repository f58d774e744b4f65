//! Wire types for the event service API
//!
//! These match the JSON shapes the backend emits. Server datetimes are
//! timezone-naive ISO strings, so they map to `NaiveDateTime` here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Authenticated user as returned by the profile endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl UserProfile {
    /// Display name, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}

/// Response from the token endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: Option<String>,
}

/// Request body for account registration
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RegisterRequest {
    /// Create a registration request with required fields
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: None,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"***")
            .field("name", &self.name)
            .finish()
    }
}

/// A stored event as returned by the server
///
/// Lookup responses inline a trimmed version of this shape, so every
/// field beyond the identity pair is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub is_favorite: bool,
    pub image_url: Option<String>,
    pub image_hash: Option<String>,
    pub raw_text: Option<String>,
    pub parsed_by_ai: Option<bool>,
    pub source_url: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

/// Client-side event creation body
#[derive(Debug, Clone, Serialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl EventDraft {
    /// Create a draft with the required title
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            date: None,
            location: None,
            price: None,
            category: None,
            image_url: None,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the event date
    pub fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set the price label
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the poster image URL
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Check the draft locally before it is sent anywhere
    ///
    /// Mirrors the server's title rule so obviously bad drafts fail
    /// without a network round trip.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation(
                "event title must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update body for an existing event
///
/// The update endpoint accepts a narrower field set than creation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl EventPatch {
    /// Create an empty patch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a new title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set a new description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set a new date
    pub fn with_date(mut self, date: NaiveDateTime) -> Self {
        self.date = Some(date);
        self
    }

    /// Set a new location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Set a new image URL
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Whether the patch changes anything
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.date.is_none()
            && self.location.is_none()
            && self.image_url.is_none()
    }
}

/// Body for the favorite toggle endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteUpdate {
    pub is_favorite: bool,
}

/// Event listing, tolerant of both plain-array and paginated shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EventListWire {
    Plain(Vec<EventRecord>),
    Paged { results: Vec<EventRecord> },
}

impl EventListWire {
    pub(crate) fn into_events(self) -> Vec<EventRecord> {
        match self {
            Self::Plain(events) => events,
            Self::Paged { results } => results,
        }
    }
}

/// Raw photo lookup response before interpretation
///
/// The server always names an `action`; which payload field carries the
/// event data varies between deployments, so both are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponse {
    pub action: String,
    pub event_id: Option<i64>,
    pub event: Option<EventRecord>,
    pub external_event: Option<ExternalCandidate>,
    pub source_url: Option<String>,
}

/// An event discovered on an external site, not yet in the catalog
///
/// Deliberately carries no id: routing to a detail view requires
/// materializing the candidate through event creation first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCandidate {
    pub title: String,
    pub description: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub location: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub source_url: Option<String>,
}

impl ExternalCandidate {
    /// Turn the candidate into a creation draft
    pub fn into_draft(self) -> EventDraft {
        EventDraft {
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            price: self.price,
            category: self.category,
            image_url: None,
        }
    }
}

impl From<EventRecord> for ExternalCandidate {
    /// Reduce a server event to a candidate, dropping its id
    fn from(event: EventRecord) -> Self {
        Self {
            title: event.title,
            description: event.description,
            date: event.date,
            location: event.location,
            price: event.price,
            category: event.category,
            source_url: event.source_url,
        }
    }
}

/// One hit from the photo similarity search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarEvent {
    pub id: i64,
    pub title: String,
    pub image_url: Option<String>,
    /// Hamming distance between perceptual hashes; lower is closer
    pub distance: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryMatchesWire {
    pub(crate) query_matches: Vec<SimilarEvent>,
}

/// Response from the health endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}
