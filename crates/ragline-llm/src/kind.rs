use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Embedding backend selector. One backend serves a whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Ollama,
    OpenRouter,
    Bedrock,
}

impl EmbeddingProviderKind {
    pub const ALL: [Self; 3] = [Self::Ollama, Self::OpenRouter, Self::Bedrock];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenRouter => "openrouter",
            Self::Bedrock => "bedrock",
        }
    }

    /// Local inference needs no API key; hosted backends do.
    #[must_use]
    pub fn requires_credential(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    /// The generation backend that shares this backend's API key, if any.
    #[must_use]
    pub fn credential_owner(self) -> Option<GenerationProviderKind> {
        match self {
            Self::Ollama => None,
            Self::OpenRouter => Some(GenerationProviderKind::OpenRouter),
            Self::Bedrock => Some(GenerationProviderKind::Bedrock),
        }
    }
}

impl fmt::Display for EmbeddingProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmbeddingProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown embedding provider: {s}"))
    }
}

/// Generation backend selector, chosen per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProviderKind {
    OpenRouter,
    Bedrock,
}

impl GenerationProviderKind {
    pub const ALL: [Self; 2] = [Self::OpenRouter, Self::Bedrock];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for GenerationProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown generation provider: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_kind_serde_lowercase() {
        let json = serde_json::to_string(&EmbeddingProviderKind::OpenRouter).unwrap();
        assert_eq!(json, "\"openrouter\"");
        let kind: EmbeddingProviderKind = serde_json::from_str("\"bedrock\"").unwrap();
        assert_eq!(kind, EmbeddingProviderKind::Bedrock);
    }

    #[test]
    fn embedding_kind_rejects_unknown() {
        assert!(serde_json::from_str::<EmbeddingProviderKind>("\"openai\"").is_err());
        assert!("openai".parse::<EmbeddingProviderKind>().is_err());
    }

    #[test]
    fn from_str_is_case_insensitive() {
        assert_eq!(
            "OpenRouter".parse::<GenerationProviderKind>().unwrap(),
            GenerationProviderKind::OpenRouter
        );
        assert_eq!(
            " ollama ".parse::<EmbeddingProviderKind>().unwrap(),
            EmbeddingProviderKind::Ollama
        );
    }

    #[test]
    fn only_ollama_is_keyless() {
        assert!(!EmbeddingProviderKind::Ollama.requires_credential());
        assert!(EmbeddingProviderKind::OpenRouter.requires_credential());
        assert!(EmbeddingProviderKind::Bedrock.requires_credential());
    }

    #[test]
    fn credential_owner_matches_backend() {
        assert_eq!(EmbeddingProviderKind::Ollama.credential_owner(), None);
        assert_eq!(
            EmbeddingProviderKind::Bedrock.credential_owner(),
            Some(GenerationProviderKind::Bedrock)
        );
    }

    #[test]
    fn display_matches_as_str() {
        for kind in GenerationProviderKind::ALL {
            assert_eq!(kind.to_string(), kind.as_str());
        }
    }
}
