//! Device token with automatic memory zeroing
//!
//! The token is wiped on drop, compared in constant time and printed as
//! `***`. It serializes as a plain string so it can live in configuration
//! files.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::Zeroize;

/// Ubidots device or account token
#[derive(Clone, Default, Zeroize)]
pub struct AuthToken {
    inner: String,
}

impl AuthToken {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            inner: token.into(),
        }
    }

    /// Borrow the raw token for the wire
    ///
    /// The returned slice must not be logged.
    pub fn expose(&self) -> &str {
        &self.inner
    }

    /// Check whether a token has been set
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Token length in bytes
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Constant-time comparison
    pub fn constant_time_eq(&self, other: &Self) -> bool {
        let (left, right) = (self.inner.as_bytes(), other.inner.as_bytes());
        if left.len() != right.len() {
            return false;
        }

        let mut result = 0u8;
        for (a, b) in left.iter().zip(right.iter()) {
            result |= a ^ b;
        }
        result == 0
    }
}

impl Drop for AuthToken {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "***")
    }
}

impl PartialEq for AuthToken {
    fn eq(&self, other: &Self) -> bool {
        self.constant_time_eq(other)
    }
}

impl Eq for AuthToken {}

impl From<String> for AuthToken {
    fn from(token: String) -> Self {
        Self::new(token)
    }
}

impl From<&str> for AuthToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl Serialize for AuthToken {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for AuthToken {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_is_redacted() {
        let token = AuthToken::new("BBFF-secret");
        assert_eq!(format!("{token}"), "***");
        assert_eq!(format!("{token:?}"), "AuthToken(***)");
        assert!(!format!("{token:?}").contains("secret"));
    }

    #[test]
    fn test_expose_and_len() {
        let token = AuthToken::from("BBFF-secret");
        assert_eq!(token.expose(), "BBFF-secret");
        assert_eq!(token.len(), 11);
        assert!(!token.is_empty());
        assert!(AuthToken::default().is_empty());
    }

    #[test]
    fn test_constant_time_eq() {
        let a = AuthToken::new("BBFF-one");
        let b = AuthToken::new(String::from("BBFF-one"));
        let c = AuthToken::new("BBFF-two");
        let d = AuthToken::new("BBFF-one-longer");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_zeroize_clears_token() {
        let mut token = AuthToken::new("BBFF-secret");
        token.zeroize();
        assert!(token.is_empty());
    }

    #[test]
    fn test_serde_as_plain_string() {
        let token = AuthToken::new("BBFF-secret");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"BBFF-secret\"");

        let parsed: AuthToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }
}
