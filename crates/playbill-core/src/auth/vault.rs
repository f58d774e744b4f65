//! OS keyring integration for credential storage
//!
//! Persists the bearer credential in the operating system's credential
//! store (e.g., macOS Keychain, Windows Credential Manager, Linux Secret
//! Service) so sessions survive process restarts.

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;

use super::credential::Credential;

/// Service name used for keyring storage
const KEYRING_SERVICE: &str = "playbill";

/// Entry key for the stored credential
const KEYRING_USER: &str = "access_token";

/// Errors raised by a credential vault
///
/// Vault failures never abort a session operation; callers log them and
/// continue with the in-memory credential.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("credential store error: {0}")]
    Backend(String),
}

/// Durable storage for the bearer credential
///
/// Exactly one credential is stored at a time. `load` returning `None`
/// means the user is anonymous as far as durable state is concerned.
#[async_trait]
pub trait CredentialVault: Send + Sync {
    /// Read the persisted credential, if any
    async fn load(&self) -> Result<Option<Credential>, VaultError>;

    /// Persist a credential, replacing any previous one
    async fn store(&self, credential: &Credential) -> Result<(), VaultError>;

    /// Remove the persisted credential; removing nothing is not an error
    async fn clear(&self) -> Result<(), VaultError>;
}

/// OS keyring-backed credential vault
///
/// # Platform Support
///
/// - **macOS**: Uses Keychain Services
/// - **Windows**: Uses Windows Credential Manager
/// - **Linux**: Uses Secret Service API (requires a secret service daemon)
#[derive(Debug, Clone)]
pub struct KeyringVault {
    service: String,
    user: String,
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyringVault {
    /// Create a vault with the default service/user names
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
            user: KEYRING_USER.to_string(),
        }
    }

    /// Create a vault with custom service/user names
    ///
    /// This can be useful for testing or multi-account scenarios.
    pub fn with_names(service: &str, user: &str) -> Self {
        Self {
            service: service.to_string(),
            user: user.to_string(),
        }
    }

    /// Get the keyring entry
    fn entry(&self) -> Result<Entry, VaultError> {
        Entry::new(&self.service, &self.user)
            .map_err(|e| VaultError::Backend(format!("Failed to create keyring entry: {}", e)))
    }
}

#[async_trait]
impl CredentialVault for KeyringVault {
    async fn load(&self) -> Result<Option<Credential>, VaultError> {
        let entry = self.entry()?;

        // keyring operations are blocking, so we spawn a blocking task
        let result = tokio::task::spawn_blocking(move || entry.get_password())
            .await
            .map_err(|e| VaultError::Backend(format!("Task join error: {}", e)))?;

        match result {
            Ok(token) => Ok(Some(Credential::new(token))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Backend(format!(
                "Failed to read credential: {}",
                e
            ))),
        }
    }

    async fn store(&self, credential: &Credential) -> Result<(), VaultError> {
        let entry = self.entry()?;
        let token = credential.as_str().to_string();

        tokio::task::spawn_blocking(move || {
            entry
                .set_password(&token)
                .map_err(|e| VaultError::Backend(format!("Failed to store credential: {}", e)))
        })
        .await
        .map_err(|e| VaultError::Backend(format!("Task join error: {}", e)))?
    }

    async fn clear(&self) -> Result<(), VaultError> {
        let entry = self.entry()?;

        tokio::task::spawn_blocking(move || match entry.delete_password() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()), // Already cleared
            Err(e) => Err(VaultError::Backend(format!(
                "Failed to delete credential: {}",
                e
            ))),
        })
        .await
        .map_err(|e| VaultError::Backend(format!("Task join error: {}", e)))?
    }
}

/// In-memory credential vault for testing
///
/// Nothing survives the process; should NOT be used in production.
#[derive(Debug, Default)]
pub struct MemoryVault {
    credential: std::sync::Mutex<Option<Credential>>,
}

impl MemoryVault {
    /// Create a new empty in-memory vault
    pub fn new() -> Self {
        Self {
            credential: std::sync::Mutex::new(None),
        }
    }

    /// Create a vault already holding a credential
    pub fn holding(credential: Credential) -> Self {
        Self {
            credential: std::sync::Mutex::new(Some(credential)),
        }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<Credential>>, VaultError> {
        self.credential
            .lock()
            .map_err(|_| VaultError::Backend("memory vault lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialVault for MemoryVault {
    async fn load(&self) -> Result<Option<Credential>, VaultError> {
        Ok(self.slot()?.clone())
    }

    async fn store(&self, credential: &Credential) -> Result<(), VaultError> {
        *self.slot()? = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), VaultError> {
        *self.slot()? = None;
        Ok(())
    }
}
