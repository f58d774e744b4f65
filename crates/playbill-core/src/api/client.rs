//! HTTP client for the event service API
//!
//! Provides an async client with:
//! - Bearer credential injection from the token store
//! - JSON, form-encoded, and multipart request bodies
//! - Uniform response classification (401, API errors, transport errors)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode, multipart};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::{Credential, TokenStore};
use crate::config::{Config, DEFAULT_BASE_URL, FavoritePolicy};
use crate::error::{Error, Result};
use crate::lookup::{LookupBackend, PendingUpload};
use crate::session::AuthBackend;

use super::types::{
    EventDraft, EventListWire, EventPatch, EventRecord, FavoriteUpdate, HealthStatus,
    LookupResponse, QueryMatchesWire, RegisterRequest, SimilarEvent, TokenResponse, UserProfile,
};

/// Client for the event service
///
/// Thread-safe; endpoint methods attach the current bearer credential
/// from the shared [`TokenStore`] and classify every response the same
/// way, so callers only ever see the crate's `Error` variants.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: String,
    tokens: Arc<TokenStore>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Builder for creating an ApiClient
pub struct ApiClientBuilder {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    tokens: Option<Arc<TokenStore>>,
}

impl Default for ApiClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            base_url: None,
            timeout_secs: None,
            tokens: None,
        }
    }

    /// Set the base URL (defaults to the local-dev server)
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the token store credentials are read from
    pub fn token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Build the ApiClient
    pub fn build(self) -> Result<ApiClient> {
        let tokens = self
            .tokens
            .ok_or_else(|| Error::Config("a token store is required".to_string()))?;

        let http = HttpClient::builder()
            .timeout(Duration::from_secs(self.timeout_secs.unwrap_or(60)))
            .build()
            .map_err(Error::Network)?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(ApiClient {
            http,
            base_url,
            tokens,
        })
    }
}

impl ApiClient {
    /// Create a new builder for ApiClient
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::new()
    }

    /// Build a client from configuration
    ///
    /// Honors the `PLAYBILL_API_BASE` environment override.
    pub fn from_config(config: &Config, tokens: Arc<TokenStore>) -> Result<Self> {
        ApiClientBuilder::new()
            .base_url(config.api.resolved_base_url())
            .timeout_secs(config.api.timeout_secs)
            .token_store(tokens)
            .build()
    }

    /// The base URL this client talks to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========== Events ==========

    /// List the caller's events
    pub async fn list_events(&self) -> Result<Vec<EventRecord>> {
        let builder = self.authorize(self.http.get(self.url("/events/"))).await;
        let wire: EventListWire = self.execute(builder).await?;
        Ok(wire.into_events())
    }

    /// Fetch a single event by id
    pub async fn event(&self, id: i64) -> Result<EventRecord> {
        let builder = self
            .authorize(self.http.get(self.url(&format!("/events/{}", id))))
            .await;
        self.execute(builder).await
    }

    /// Create an event from a draft
    ///
    /// The draft is validated locally first; invalid drafts never reach
    /// the network.
    pub async fn create_event(&self, draft: &EventDraft) -> Result<EventRecord> {
        draft.validate()?;
        let builder = self
            .authorize(self.http.post(self.url("/events/")))
            .await
            .json(draft);
        self.execute(builder).await
    }

    /// Update an existing event
    pub async fn update_event(&self, id: i64, patch: &EventPatch) -> Result<EventRecord> {
        let builder = self
            .authorize(self.http.put(self.url(&format!("/events/{}", id))))
            .await
            .json(patch);
        self.execute(builder).await
    }

    /// Delete an event
    pub async fn delete_event(&self, id: i64) -> Result<()> {
        let builder = self
            .authorize(self.http.delete(self.url(&format!("/events/{}", id))))
            .await;
        self.execute_empty(builder).await
    }

    /// Full-text search over events
    pub async fn search_events(&self, query: &str) -> Result<Vec<EventRecord>> {
        let builder = self
            .authorize(self.http.get(self.url("/events/search")))
            .await
            .query(&[("q", query)]);
        let wire: EventListWire = self.execute(builder).await?;
        Ok(wire.into_events())
    }

    /// Persist an event's favorite flag
    pub async fn set_favorite(&self, id: i64, is_favorite: bool) -> Result<EventRecord> {
        let builder = self
            .authorize(self.http.patch(self.url(&format!("/events/{}/favorite", id))))
            .await
            .json(&FavoriteUpdate { is_favorite });
        self.execute(builder).await
    }

    /// Flip an event's favorite flag under the configured policy
    ///
    /// `Server` persists the toggle; `Local` only updates the returned
    /// copy, leaving the server untouched.
    pub async fn toggle_favorite(
        &self,
        event: &EventRecord,
        policy: FavoritePolicy,
    ) -> Result<EventRecord> {
        let target = !event.is_favorite;
        match policy {
            FavoritePolicy::Server => self.set_favorite(event.id, target).await,
            FavoritePolicy::Local => {
                debug!(event_id = event.id, "favorite toggled locally only");
                let mut updated = event.clone();
                updated.is_favorite = target;
                Ok(updated)
            }
        }
    }

    // ========== Photo ==========

    /// Submit a poster photo for recognition
    pub async fn photo_lookup(&self, upload: &PendingUpload) -> Result<LookupResponse> {
        debug!(
            file = %upload.file_name(),
            bytes = upload.len(),
            "submitting photo lookup"
        );
        let form = multipart::Form::new().part("file", self.image_part(upload)?);
        let builder = self
            .authorize(self.http.post(self.url("/photo/lookup")))
            .await
            .multipart(form);
        self.execute(builder).await
    }

    /// Find catalog events visually similar to a photo
    pub async fn similar_by_photo(&self, upload: &PendingUpload) -> Result<Vec<SimilarEvent>> {
        let form = multipart::Form::new().part("file", self.image_part(upload)?);
        let builder = self
            .authorize(self.http.post(self.url("/photo/")))
            .await
            .multipart(form);
        let wire: QueryMatchesWire = self.execute(builder).await?;
        Ok(wire.query_matches)
    }

    // ========== Auth ==========

    /// Exchange credentials for a bearer token
    ///
    /// The token endpoint is the one form-encoded call in the API; no
    /// bearer header is attached.
    pub async fn exchange_token(&self, email: &str, password: &str) -> Result<Credential> {
        let params = [("username", email), ("password", password)];
        let builder = self.http.post(self.url("/auth/token")).form(&params);
        let token: TokenResponse = self.execute(builder).await?;
        Ok(Credential::new(token.access_token))
    }

    /// Create a new account
    pub async fn register(&self, request: &RegisterRequest) -> Result<UserProfile> {
        let builder = self.http.post(self.url("/auth/register")).json(request);
        self.execute(builder).await
    }

    /// Fetch the profile for the current credential
    pub async fn me(&self) -> Result<UserProfile> {
        let builder = self.authorize(self.http.get(self.url("/auth/me"))).await;
        self.execute(builder).await
    }

    /// Fetch the profile for an explicit credential
    ///
    /// Used during login and bootstrap, where the credential being
    /// proven is not yet (or not necessarily) the stored one.
    pub async fn me_with(&self, credential: &Credential) -> Result<UserProfile> {
        let builder = self
            .http
            .get(self.url("/auth/me"))
            .bearer_auth(credential.as_str());
        self.execute(builder).await
    }

    /// Probe the service health endpoint
    pub async fn health(&self) -> Result<HealthStatus> {
        let builder = self.http.get(self.url("/health"));
        self.execute(builder).await
    }

    // ========== Internals ==========

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attach the current bearer credential, if any
    async fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.tokens.get().await {
            Some(credential) => builder.bearer_auth(credential.as_str()),
            None => builder,
        }
    }

    /// Build the multipart file part for an image upload
    fn image_part(&self, upload: &PendingUpload) -> Result<multipart::Part> {
        let part = multipart::Part::bytes(upload.bytes().to_vec())
            .file_name(upload.file_name().to_string())
            .mime_str(upload.mime_type())?;
        Ok(part)
    }

    /// Send a request and parse the JSON response body
    async fn execute<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await.map_err(Error::Network)?;
        let status = response.status();

        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::Protocol(format!("malformed response body: {}", e)))
    }

    /// Send a request and discard the response body (204 endpoints)
    async fn execute_empty(&self, builder: RequestBuilder) -> Result<()> {
        let response = builder.send().await.map_err(Error::Network)?;
        let status = response.status();

        if !status.is_success() {
            return self.handle_error_response(status, response).await;
        }

        Ok(())
    }

    /// Classify error responses from the API
    async fn handle_error_response<T>(
        &self,
        status: StatusCode,
        response: reqwest::Response,
    ) -> Result<T> {
        let body = response.text().await.unwrap_or_default();
        let message = server_error_message(status, &body);

        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(message));
        }

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AuthBackend for ApiClient {
    async fn exchange_token(&self, email: &str, password: &str) -> Result<Credential> {
        ApiClient::exchange_token(self, email, password).await
    }

    async fn register(&self, request: &RegisterRequest) -> Result<UserProfile> {
        ApiClient::register(self, request).await
    }

    async fn fetch_profile(&self, credential: &Credential) -> Result<UserProfile> {
        self.me_with(credential).await
    }
}

#[async_trait]
impl LookupBackend for ApiClient {
    async fn lookup_photo(&self, upload: &PendingUpload) -> Result<LookupResponse> {
        self.photo_lookup(upload).await
    }
}

/// Extract a human-readable message from an error response body
///
/// Probes the keys the server is known to use, in order of preference:
/// `detail` (FastAPI-style, sometimes a structured value), then `error`,
/// then `message`. Non-JSON bodies are surfaced verbatim; empty ones
/// fall back to the status line.
fn server_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => {
            if let Some(detail) = json.get("detail") {
                if let Some(text) = detail.as_str() {
                    return text.to_string();
                }
                if !detail.is_null() {
                    return detail.to_string();
                }
            }
            for key in ["error", "message"] {
                if let Some(text) = json.get(key).and_then(|v| v.as_str()) {
                    return text.to_string();
                }
            }
            status_line(status)
        }
        Err(_) => {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                status_line(status)
            } else {
                trimmed.to_string()
            }
        }
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}
