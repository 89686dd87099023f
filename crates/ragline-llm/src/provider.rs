use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;

use crate::error::LlmError;
use crate::secret::Secret;

/// Incremental text deltas, in arrival order, from a streaming generation call.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

pub type EmbedFuture = Pin<Box<dyn Future<Output = Result<Vec<f32>, LlmError>> + Send>>;

/// A single generation call: system instructions, the user message and an optional
/// model override.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system_prompt: &'a str,
    pub message: &'a str,
    pub model: Option<&'a str>,
}

impl<'a> GenerateRequest<'a> {
    #[must_use]
    pub fn new(system_prompt: &'a str, message: &'a str) -> Self {
        Self {
            system_prompt,
            message,
            model: None,
        }
    }

    /// Blank overrides are ignored.
    #[must_use]
    pub fn with_model(mut self, model: Option<&'a str>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    #[must_use]
    pub fn model_or<'b>(&self, default: &'b str) -> &'b str
    where
        'a: 'b,
    {
        self.model.unwrap_or(default)
    }
}

pub trait Embedder: Send + Sync {
    /// Turn `text` into a vector.
    ///
    /// # Errors
    ///
    /// Returns an error on a missing credential, transport failure, non-success status,
    /// malformed body or an empty vector. Nothing is retried.
    fn embed(
        &self,
        text: &str,
        credential: Option<&Secret>,
    ) -> impl Future<Output = Result<Vec<f32>, LlmError>> + Send;

    fn requires_credential(&self) -> bool;

    fn name(&self) -> &'static str;
}

pub trait Generator: Send + Sync {
    /// Single-shot generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or returns no text.
    fn generate(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Start a streaming generation. The returned stream ends when the backend finishes.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::StreamUnsupported`] for backends that cannot stream, or an error
    /// if the stream could not be opened.
    fn generate_stream(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> impl Future<Output = Result<DeltaStream, LlmError>> + Send;

    fn supports_streaming(&self) -> bool;

    fn name(&self) -> &'static str;
}

pub(crate) fn require_credential<'s>(
    credential: Option<&'s Secret>,
    provider: &'static str,
) -> Result<&'s Secret, LlmError> {
    credential
        .filter(|c| !c.is_blank())
        .ok_or(LlmError::MissingCredential { provider })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_model_override_is_ignored() {
        let req = GenerateRequest::new("sys", "hi").with_model(Some("  "));
        assert!(req.model.is_none());
        assert_eq!(req.model_or("default-model"), "default-model");
    }

    #[test]
    fn model_override_wins() {
        let req = GenerateRequest::new("sys", "hi").with_model(Some("meta/llama"));
        assert_eq!(req.model_or("default-model"), "meta/llama");
    }

    #[test]
    fn require_credential_rejects_blank() {
        let blank = Secret::new("");
        let err = require_credential(Some(&blank), "openrouter").unwrap_err();
        assert!(err.is_missing_credential());
        assert!(require_credential(None, "bedrock").is_err());
        let key = Secret::new("k");
        assert!(require_credential(Some(&key), "bedrock").is_ok());
    }
}
