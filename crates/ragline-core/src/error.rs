use ragline_llm::LlmError;
use ragline_memory::MemoryError;

use crate::settings::SettingsError;

/// Coarse failure classes; the HTTP layer maps each to one status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    Upstream,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::NotFound => "not_found",
            Self::Upstream => "upstream",
            Self::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("{0}")]
    Validation(String),

    #[error("API key is not configured for provider: {provider}")]
    Unauthorized { provider: &'static str },

    #[error("{0}")]
    NotFound(String),

    #[error("failed to generate query embedding: {0}")]
    Embedding(#[source] LlmError),

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("streaming not supported for provider: {provider}")]
    StreamUnsupported { provider: &'static str },

    #[error(transparent)]
    Storage(#[from] MemoryError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl RagError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::StreamUnsupported { .. } => ErrorKind::Validation,
            Self::Unauthorized { .. } => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Embedding(e) | Self::Generation(e) => llm_kind(e),
            Self::Storage(e) => memory_kind(e),
            Self::Settings(e) if e.is_validation() => ErrorKind::Validation,
            Self::Settings(_) => ErrorKind::Internal,
            Self::Io(_) | Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

fn llm_kind(e: &LlmError) -> ErrorKind {
    if e.is_missing_credential() {
        ErrorKind::Unauthorized
    } else {
        ErrorKind::Upstream
    }
}

fn memory_kind(e: &MemoryError) -> ErrorKind {
    match e {
        MemoryError::Embedding { source, .. } => llm_kind(source),
        e if e.is_validation() => ErrorKind::Validation,
        _ => ErrorKind::Internal,
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(RagError::Validation("x".into()).kind(), ErrorKind::Validation);
        assert_eq!(
            RagError::Unauthorized { provider: "bedrock" }.kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(RagError::NotFound("doc".into()).kind(), ErrorKind::NotFound);
        assert_eq!(
            RagError::Generation(LlmError::Status {
                provider: "openrouter",
                status: 503
            })
            .kind(),
            ErrorKind::Upstream
        );
        assert_eq!(
            RagError::StreamUnsupported {
                provider: "openrouter"
            }
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn memory_errors_split_by_cause() {
        assert_eq!(
            RagError::from(MemoryError::EmptyDocument).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            RagError::from(MemoryError::LockPoisoned).kind(),
            ErrorKind::Internal
        );
        let upstream = MemoryError::Embedding {
            index: 0,
            source: LlmError::EmptyEmbedding { provider: "ollama" },
        };
        assert_eq!(RagError::from(upstream).kind(), ErrorKind::Upstream);
        let no_key = MemoryError::Embedding {
            index: 0,
            source: LlmError::MissingCredential {
                provider: "openrouter",
            },
        };
        assert_eq!(RagError::from(no_key).kind(), ErrorKind::Unauthorized);
    }

    #[test]
    fn settings_errors_split_by_cause() {
        let invalid = SettingsError::Invalid("name is required".into());
        assert_eq!(RagError::from(invalid).kind(), ErrorKind::Validation);
        assert_eq!(
            RagError::from(SettingsError::LockPoisoned).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn wrong_embedding_length_is_upstream() {
        let err = LlmError::DimensionMismatch {
            provider: "ollama",
            expected: 768,
            actual: 384,
        };
        assert_eq!(RagError::Embedding(err).kind(), ErrorKind::Upstream);
        let during_ingest = MemoryError::Embedding {
            index: 0,
            source: LlmError::DimensionMismatch {
                provider: "ollama",
                expected: 768,
                actual: 384,
            },
        };
        assert_eq!(RagError::from(during_ingest).kind(), ErrorKind::Upstream);
    }

    #[test]
    fn unauthorized_message_names_provider() {
        assert_eq!(
            RagError::Unauthorized { provider: "bedrock" }.to_string(),
            "API key is not configured for provider: bedrock"
        );
    }
}
