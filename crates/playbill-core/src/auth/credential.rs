//! Bearer credential issued by the token endpoint

use std::fmt;

/// Opaque bearer token proving an authenticated identity
///
/// The token body never expires client-side and carries no readable
/// claims; the server is the only judge of validity. Debug output is
/// redacted so credentials cannot leak through logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw access token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token for the Authorization header
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Credential {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.len() <= 4 {
            write!(f, "Credential(***)")
        } else {
            write!(f, "Credential(***{})", &self.0[self.0.len() - 4..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let credential = Credential::new("eyJhbGciOiJIUzI1NiJ9.secret-body.sig-abcd");
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("secret-body"));
        assert!(debug.contains("abcd"));
    }

    #[test]
    fn test_short_token_fully_redacted() {
        let credential = Credential::new("abc");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
    }

    #[test]
    fn test_as_str_round_trip() {
        let credential = Credential::from("token-123".to_string());
        assert_eq!(credential.as_str(), "token-123");
    }
}
