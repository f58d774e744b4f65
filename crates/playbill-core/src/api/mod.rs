//! Event service API - HTTP client and wire types
//!
//! This module provides:
//! - `ApiClient` with bearer injection and uniform response classification
//! - Request/response types matching the backend's JSON shapes
//! - The production implementations of the session and lookup backends

mod client;
mod types;

pub use client::{ApiClient, ApiClientBuilder};
pub use types::{
    EventDraft, EventPatch, EventRecord, ExternalCandidate, FavoriteUpdate, HealthStatus,
    LookupResponse, RegisterRequest, SimilarEvent, TokenResponse, UserProfile,
};
