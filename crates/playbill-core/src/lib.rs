//! Playbill Core Library
//!
//! This crate provides the client-side core for Playbill, including:
//! - Credential storage (OS keyring + in-memory token store)
//! - Session management (bootstrap, login, logout, the 401 policy)
//! - HTTP API client for the event catalog and photo endpoints
//! - Photo lookup flow (select, submit, interpret the outcome)
//! - Configuration (TOML file + environment overrides)

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod lookup;
pub mod session;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::api::{ApiClient, EventDraft, EventPatch, EventRecord};
    pub use crate::auth::{KeyringVault, TokenStore};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::lookup::{LookupOutcome, PendingUpload, PhotoLookupFlow};
    pub use crate::session::{SessionManager, SessionState};
}
