//! Credential type
//!
//! A credential is an opaque API key. Pool members are interchangeable but
//! rate-limited independently, so the only thing the pool knows about a
//! credential is its position.

use std::fmt;

/// Number of characters kept visible on each side of a masked key
const VISIBLE_CHARS: usize = 4;

// ============================================================================
// Credential
// ============================================================================

/// An API key for the remote service
///
/// `Debug` and `Display` print a masked form so keys never reach the logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    api_key: String,
}

impl Credential {
    /// Create a credential from a raw API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Get the raw API key
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Masked form of the key, e.g. `AIza…3DbK`
    pub fn masked(&self) -> String {
        let count = self.api_key.chars().count();
        if count <= VISIBLE_CHARS * 2 {
            return "*".repeat(count);
        }
        let head: String = self.api_key.chars().take(VISIBLE_CHARS).collect();
        let tail: String = self
            .api_key
            .chars()
            .skip(count - VISIBLE_CHARS)
            .collect();
        format!("{}…{}", head, tail)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.masked()).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

impl From<String> for Credential {
    fn from(api_key: String) -> Self {
        Self::new(api_key)
    }
}

impl From<&str> for Credential {
    fn from(api_key: &str) -> Self {
        Self::new(api_key)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_roundtrip() {
        let cred = Credential::new("AIzaSyExampleKey123");
        assert_eq!(cred.api_key(), "AIzaSyExampleKey123");
    }

    #[test]
    fn test_masked_keeps_ends() {
        let cred = Credential::new("AIzaSyDwTSvkH1mvEuXw3DbK");
        assert_eq!(cred.masked(), "AIza…3DbK");
        assert_eq!(cred.to_string(), "AIza…3DbK");
    }

    #[test]
    fn test_short_key_fully_masked() {
        let cred = Credential::new("k1");
        assert_eq!(cred.masked(), "**");
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let cred = Credential::new("AIzaSyDwTSvkH1mvEuXw3DbK");
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("SyDwTSvkH1mvEuXw"));
        assert!(debug.contains("AIza…3DbK"));
    }
}
