//! Playbill Core Integration Tests

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use playbill_core::{
    Error, Result,
    api::{LookupResponse, RegisterRequest, UserProfile},
    auth::{Credential, CredentialVault, MemoryVault, TokenStore},
    config::{Config, FavoritePolicy},
    lookup::{LookupBackend, LookupOutcome, LookupState, PendingUpload, PhotoLookupFlow},
    session::{AuthBackend, SessionManager, SessionState},
};

/// Scripted stand-in for the whole server, wired into both the session
/// manager and the lookup flow
#[derive(Default)]
struct ScriptedServer {
    tokens: Mutex<VecDeque<Result<Credential>>>,
    profiles: Mutex<VecDeque<Result<UserProfile>>>,
    lookups: Mutex<VecDeque<Result<LookupResponse>>>,
    lookup_calls: AtomicUsize,
}

impl ScriptedServer {
    fn new() -> Self {
        Self::default()
    }

    fn with_token(self, result: Result<Credential>) -> Self {
        self.tokens.lock().unwrap().push_back(result);
        self
    }

    fn with_profile(self, result: Result<UserProfile>) -> Self {
        self.profiles.lock().unwrap().push_back(result);
        self
    }

    fn with_lookup(self, result: Result<LookupResponse>) -> Self {
        self.lookups.lock().unwrap().push_back(result);
        self
    }
}

#[async_trait]
impl AuthBackend for ScriptedServer {
    async fn exchange_token(&self, _email: &str, _password: &str) -> Result<Credential> {
        self.tokens
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }

    async fn register(&self, _request: &RegisterRequest) -> Result<UserProfile> {
        Err(exhausted())
    }

    async fn fetch_profile(&self, _credential: &Credential) -> Result<UserProfile> {
        self.profiles
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }
}

#[async_trait]
impl LookupBackend for ScriptedServer {
    async fn lookup_photo(&self, _upload: &PendingUpload) -> Result<LookupResponse> {
        self.lookup_calls.fetch_add(1, Ordering::SeqCst);
        self.lookups
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(exhausted()))
    }
}

fn exhausted() -> Error {
    Error::Api {
        status: 500,
        message: "scripted server has no response".to_string(),
    }
}

fn profile(id: i64, email: &str) -> UserProfile {
    UserProfile {
        id,
        email: email.to_string(),
        name: Some("Integration Tester".to_string()),
        created_at: None,
    }
}

fn poster() -> PendingUpload {
    PendingUpload::from_bytes(
        "poster.png",
        vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
    )
    .unwrap()
}

fn lookup_json(value: serde_json::Value) -> LookupResponse {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_login_then_lookup_workflow() {
    let server = Arc::new(
        ScriptedServer::new()
            .with_token(Ok(Credential::new("workflow-token")))
            .with_profile(Ok(profile(1, "goer@example.com")))
            .with_lookup(Ok(lookup_json(serde_json::json!({
                "action": "matched",
                "event_id": 42,
                "event": {"id": 42, "title": "Jazz Night", "location": "Blue Room"}
            })))),
    );

    let vault = Arc::new(MemoryVault::new());
    let tokens = Arc::new(TokenStore::new(vault.clone()));
    let session = SessionManager::new(server.clone(), tokens.clone());

    assert_eq!(session.bootstrap().await, SessionState::Anonymous);
    let user = session.login("goer@example.com", "pw").await.unwrap();
    assert_eq!(user.id, 1);
    assert!(vault.load().await.unwrap().is_some());

    let flow = PhotoLookupFlow::new(server.clone());
    flow.select_image(poster()).unwrap();
    let outcome = flow.submit().await.unwrap();

    assert_eq!(outcome.event_id(), Some(42));
    assert_eq!(server.lookup_calls.load(Ordering::SeqCst), 1);

    session.logout().await;
    assert!(vault.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_external_candidate_materialization_path() {
    let server = Arc::new(ScriptedServer::new().with_lookup(Ok(lookup_json(
        serde_json::json!({
            "action": "found_external",
            "external_event": {
                "title": "Harbor Poetry Slam",
                "location": "Pier 3",
                "source_url": "https://venues.example/slam"
            }
        }),
    ))));

    let flow = PhotoLookupFlow::new(server);
    flow.select_image(poster()).unwrap();
    let outcome = flow.submit().await.unwrap();

    // No id until the candidate is turned into a real event
    assert_eq!(outcome.event_id(), None);
    let LookupOutcome::FoundExternal { candidate } = outcome else {
        panic!("expected an external candidate");
    };

    assert_eq!(
        candidate.source_url.as_deref(),
        Some("https://venues.example/slam")
    );
    let draft = candidate.into_draft();
    draft.validate().unwrap();
    let body = serde_json::to_value(&draft).unwrap();
    assert_eq!(body["title"], "Harbor Poetry Slam");
    assert_eq!(body["location"], "Pier 3");
    // The creation body matches the create schema; the source link is
    // candidate-side context, not an event field
    assert!(body.get("source_url").is_none());
}

#[tokio::test]
async fn test_unauthorized_lookup_tears_down_session() {
    let server = Arc::new(
        ScriptedServer::new()
            .with_token(Ok(Credential::new("doomed-token")))
            .with_profile(Ok(profile(2, "goer@example.com")))
            .with_lookup(Err(Error::Unauthorized("token expired".to_string()))),
    );

    let vault = Arc::new(MemoryVault::new());
    let tokens = Arc::new(TokenStore::new(vault.clone()));
    let session = SessionManager::new(server.clone(), tokens.clone());
    session.bootstrap().await;
    session.login("goer@example.com", "pw").await.unwrap();

    let flow = PhotoLookupFlow::new(server);
    flow.select_image(poster()).unwrap();
    let err = flow.submit().await.unwrap_err();
    assert!(err.is_unauthorized());

    // The flow keeps its own failure state; the session reacts to 401
    assert!(matches!(flow.state(), LookupState::Failed { .. }));
    assert!(session.recover(&err).await);
    assert_eq!(session.state(), SessionState::Anonymous);
    assert!(tokens.get().await.is_none());
    assert!(vault.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_bootstrap_restores_and_logout_clears() {
    let server = Arc::new(ScriptedServer::new().with_profile(Ok(profile(3, "back@example.com"))));
    let vault = Arc::new(MemoryVault::holding(Credential::new("persisted")));
    let tokens = Arc::new(TokenStore::new(vault.clone()));
    let session = SessionManager::new(server, tokens);

    let state = session.bootstrap().await;
    assert!(state.is_authenticated());
    assert_eq!(state.user().unwrap().email, "back@example.com");

    session.logout().await;
    assert!(vault.load().await.unwrap().is_none());
}

#[test]
fn test_unauthorized_error_suggests_login() {
    let error = Error::Unauthorized("token expired".to_string());
    assert!(error.to_string().contains("playbill login"));
    assert!(error.suggestion().is_some());
}

#[test]
fn test_validation_error_display() {
    let error = Error::Validation("title cannot be empty".to_string());
    let display = format!("{}", error);
    assert!(display.contains("title cannot be empty"));
}

#[test]
fn test_result_types() {
    let ok_result: Result<i32> = Ok(42);
    let err_result: Result<i32> = Err(Error::Protocol("bad payload".to_string()));

    assert!(ok_result.is_ok());
    assert!(err_result.is_err());
}

#[test]
fn test_default_config_shape() {
    let config = Config::default();
    assert!(config.api.base_url.starts_with("http://"));
    assert!(config.api.timeout_secs > 0);
    assert_eq!(config.events.favorite_sync, FavoritePolicy::Server);
}
