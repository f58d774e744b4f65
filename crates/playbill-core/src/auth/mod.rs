//! Credential handling
//!
//! This module provides:
//! - The opaque bearer `Credential` newtype
//! - Durable credential storage behind the `CredentialVault` trait
//! - The in-memory-first `TokenStore` the rest of the client reads from

mod credential;
mod token_store;
mod vault;

pub use credential::Credential;
pub use token_store::TokenStore;
pub use vault::{CredentialVault, KeyringVault, MemoryVault, VaultError};
