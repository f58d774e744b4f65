//! In-memory-first credential slot mirrored to durable storage
//!
//! The in-memory slot is the source of truth for the running process;
//! the vault is a mirror that lets sessions survive restarts. Writes
//! land in memory before any vault I/O, so a read issued right after a
//! write never observes the old credential, and a failing vault degrades
//! the session to memory-only instead of failing the operation.

use std::sync::{Arc, RwLock};

use tracing::warn;

use super::credential::Credential;
use super::vault::{CredentialVault, VaultError};

/// In-memory view of the credential slot
///
/// `Vacant` means nothing has been written this process yet, so reads
/// fall through to the vault. `Absent` records an explicit clear and
/// blocks that fallback; otherwise a failed vault delete could
/// resurrect a logged-out credential.
#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Vacant,
    Present(Credential),
    Absent,
}

/// Process-wide holder of the bearer credential
///
/// The session manager is the only writer; the HTTP client reads from
/// here when attaching the Authorization header.
pub struct TokenStore {
    slot: RwLock<Slot>,
    vault: Arc<dyn CredentialVault>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.slot.read() {
            Ok(guard) => match &*guard {
                Slot::Vacant => "vacant",
                Slot::Present(_) => "present",
                Slot::Absent => "absent",
            },
            Err(_) => "poisoned",
        };
        f.debug_struct("TokenStore").field("slot", &state).finish()
    }
}

impl TokenStore {
    /// Create a store over the given vault
    pub fn new(vault: Arc<dyn CredentialVault>) -> Self {
        Self {
            slot: RwLock::new(Slot::Vacant),
            vault,
        }
    }

    /// Current credential
    ///
    /// Prefers the in-memory slot; falls through to the vault only when
    /// nothing has been written this process. Vault read failures are
    /// logged and reported as anonymous.
    pub async fn get(&self) -> Option<Credential> {
        let snapshot = self.slot.read().ok().map(|guard| guard.clone());

        match snapshot {
            Some(Slot::Present(credential)) => Some(credential),
            Some(Slot::Absent) => None,
            _ => match self.vault.load().await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "credential store read failed");
                    None
                }
            },
        }
    }

    /// Replace the credential, `None` to clear
    ///
    /// The in-memory slot is updated before the vault write begins, and
    /// vault failures are swallowed after logging: the session stays
    /// usable, it just will not survive a restart.
    pub async fn set(&self, credential: Option<Credential>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = match &credential {
                Some(c) => Slot::Present(c.clone()),
                None => Slot::Absent,
            };
        }

        let result = match &credential {
            Some(c) => self.vault.store(c).await,
            None => self.vault.clear().await,
        };

        if let Err(e) = result {
            warn!(error = %e, "credential store sync failed; session continues in memory");
        }
    }

    /// Install a credential read from durable storage
    ///
    /// Memory-only: used by session bootstrap to activate a persisted
    /// credential without writing it straight back to the vault.
    pub fn hydrate(&self, credential: Option<Credential>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = match credential {
                Some(c) => Slot::Present(c),
                None => Slot::Absent,
            };
        }
    }

    /// Read the vault directly, bypassing the in-memory slot
    pub async fn load_persisted(&self) -> Result<Option<Credential>, VaultError> {
        self.vault.load().await
    }
}
