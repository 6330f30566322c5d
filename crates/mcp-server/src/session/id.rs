//! Session identifiers

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque, unguessable session token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Token length in bytes before hex encoding
    const TOKEN_BYTES: usize = 32;

    /// Generate a fresh id from the OS random source
    pub fn generate() -> Self {
        let mut token = [0u8; Self::TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut token);
        Self(hex::encode(token))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generated_ids_are_hex_and_distinct() {
        let ids: HashSet<_> = (0..256).map(|_| SessionId::generate()).collect();
        assert_eq!(ids.len(), 256);

        for id in &ids {
            assert_eq!(id.as_str().len(), 64);
            assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_display_and_from() {
        let id = SessionId::from("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(SessionId::from("abc123".to_string()), id);
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc123\"");
    }
}
