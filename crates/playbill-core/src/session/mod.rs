//! Session lifecycle
//!
//! This module owns who the user currently is:
//! - `SessionState`: bootstrapping, authenticated, or anonymous
//! - `SessionManager`: the single writer of credential and state
//! - `AuthBackend`: the server seam the manager talks through

mod manager;

pub use manager::{AuthBackend, SessionManager, SessionState};
