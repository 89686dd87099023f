#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{provider} requires an API key")]
    MissingCredential { provider: &'static str },

    #[error("{provider} request failed (status {status})")]
    Status { provider: &'static str, status: u16 },

    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("{provider} returned an empty embedding")]
    EmptyEmbedding { provider: &'static str },

    #[error("{provider} returned a {actual}-dimensional embedding, expected {expected}")]
    DimensionMismatch {
        provider: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("streaming not supported by {provider}")]
    StreamUnsupported { provider: &'static str },

    #[error("SSE parse error: {0}")]
    SseParse(String),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// True when the failure was detected before any network call was made.
    #[must_use]
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
