//! Interpretation of the lookup response

use crate::api::{EventRecord, ExternalCandidate, LookupResponse};
use crate::error::{Error, Result};

/// What a poster lookup resolved to
///
/// Exactly one of these per successful lookup. `Matched` and `Created`
/// carry persisted events and therefore ids; an external candidate has
/// no id until it is materialized through event creation.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// The poster matched an event already in the catalog
    Matched { event: EventRecord },
    /// The server read the poster and created a new event from it
    Created { event: EventRecord },
    /// A scraper found the event on an external site
    FoundExternal { candidate: ExternalCandidate },
}

impl LookupOutcome {
    /// Translate the wire response into an outcome
    ///
    /// `matched` and `created` must inline the event. `found_external`
    /// prefers the detached candidate; some server versions inline a
    /// persisted event instead, which is accepted with its id dropped
    /// so the no-id rule for candidates holds. Unknown actions and
    /// recognized actions with a missing payload are protocol errors,
    /// never a guessed variant.
    pub fn from_response(response: LookupResponse) -> Result<Self> {
        match response.action.as_str() {
            "matched" => {
                let event = response
                    .event
                    .ok_or_else(|| Error::Protocol("matched lookup without an event".to_string()))?;
                Ok(Self::Matched { event })
            }
            "created" => {
                let event = response
                    .event
                    .ok_or_else(|| Error::Protocol("created lookup without an event".to_string()))?;
                Ok(Self::Created { event })
            }
            "found_external" => {
                if let Some(candidate) = response.external_event {
                    return Ok(Self::FoundExternal { candidate });
                }
                let event = response.event.ok_or_else(|| {
                    Error::Protocol("found_external lookup without a candidate".to_string())
                })?;
                Ok(Self::FoundExternal {
                    candidate: ExternalCandidate::from(event),
                })
            }
            other => Err(Error::Protocol(format!(
                "unknown lookup action '{}'",
                other
            ))),
        }
    }

    /// Persisted event id, if this outcome already has one
    pub fn event_id(&self) -> Option<i64> {
        match self {
            Self::Matched { event } | Self::Created { event } => Some(event.id),
            Self::FoundExternal { .. } => None,
        }
    }

    /// Short label for logs and command output
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Matched { .. } => "matched",
            Self::Created { .. } => "created",
            Self::FoundExternal { .. } => "found_external",
        }
    }
}
