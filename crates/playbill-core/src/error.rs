//! Error types for Playbill

use thiserror::Error;

/// Result type alias using Playbill's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Playbill error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Local validation, raised before any network activity
    #[error("Invalid input: {0}")]
    Validation(String),

    // Transport-level failures (DNS, refused connection, timeout)
    #[error("Network error: {0}. Check that the API server is reachable.")]
    Network(#[from] reqwest::Error),

    // Server rejected the request with a non-2xx status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    // 401 responses; the session layer reacts to these globally
    #[error("Not authorized: {0}. Run `playbill login` to start a session.")]
    Unauthorized(String),

    // Server spoke a shape this client does not understand
    #[error("Unexpected server response: {0}")]
    Protocol(String),

    // Credential rejection during login or registration
    #[error("Authentication failed: {0}")]
    Auth(String),

    // State machine guard violations
    #[error("Invalid operation: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is a 401 rejection of the current credential
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Unauthorized(_) => Some("playbill login".to_string()),
            Self::Auth(_) => Some("playbill login".to_string()),
            Self::Network(_) => Some("playbill doctor".to_string()),
            Self::Config(_) => Some("playbill config list".to_string()),
            Self::Protocol(_) => Some("Update the client or check the server version".to_string()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unauthorized() {
        let err = Error::Unauthorized("token expired".to_string());
        assert!(err.is_unauthorized());

        let err = Error::Api {
            status: 500,
            message: "boom".to_string(),
        };
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn test_display_includes_status() {
        let err = Error::Api {
            status: 404,
            message: "event not found".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("404"));
        assert!(text.contains("event not found"));
    }

    #[test]
    fn test_suggestion() {
        assert!(
            Error::Unauthorized("expired".to_string())
                .suggestion()
                .is_some()
        );
        assert!(
            Error::Validation("blank title".to_string())
                .suggestion()
                .is_none()
        );
    }
}
