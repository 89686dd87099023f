use ragline_llm::LlmError;

#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid chunk configuration: {0}")]
    InvalidChunkConfig(String),

    #[error("document content is empty")]
    EmptyDocument,

    #[error("fragment {0} has no embedding")]
    MissingEmbedding(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("query embedding is empty")]
    EmptyQuery,

    #[error("embedding for {0} contains a NaN or infinite component")]
    NonFiniteEmbedding(String),

    #[error("unsupported file type: {0} (only .txt and .md are accepted)")]
    UnsupportedFileType(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("file is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("failed to generate embedding for chunk {index}: {source}")]
    Embedding {
        index: usize,
        #[source]
        source: LlmError,
    },

    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("snapshot persist failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("index lock poisoned")]
    LockPoisoned,

    #[error("snapshot task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl MemoryError {
    /// Bad input rejected before any state changed.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidChunkConfig(_)
                | Self::EmptyDocument
                | Self::MissingEmbedding(_)
                | Self::DimensionMismatch { .. }
                | Self::EmptyQuery
                | Self::NonFiniteEmbedding(_)
                | Self::UnsupportedFileType(_)
                | Self::FileTooLarge { .. }
                | Self::InvalidUtf8
        )
    }
}
