use std::fmt;

use serde::Deserialize;

/// Wrapper for API keys with redacted Debug/Display.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns `None` for blank values so callers can treat "" like an absent key.
    #[must_use]
    pub fn non_blank(value: Option<String>) -> Option<Self> {
        value.map(Self::new).filter(|s| !s.is_blank())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_and_display_are_redacted() {
        let secret = Secret::new("sk-or-v1-abc");
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
        assert_eq!(secret.expose(), "sk-or-v1-abc");
    }

    #[test]
    fn non_blank_filters_empty_values() {
        assert!(Secret::non_blank(None).is_none());
        assert!(Secret::non_blank(Some(String::new())).is_none());
        assert!(Secret::non_blank(Some("   ".into())).is_none());
        assert!(Secret::non_blank(Some("key".into())).is_some());
    }

    #[test]
    fn deserializes_transparently() {
        let secret: Secret = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(secret.expose(), "abc");
    }
}
