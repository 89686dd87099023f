use ragline_llm::{AnyEmbedder, EmbedFuture, Embedder, EmbeddingProviderKind, LlmError, Secret};
use ragline_memory::EmbedFn;

use crate::credentials::Credentials;
use crate::error::RagError;

/// The one embedding backend of an index, with its credential lookup and the
/// vector length every result must have.
///
/// Both ingestion and queries embed through here, so a backend that returns the
/// wrong length fails as an upstream error before anything is indexed or searched.
#[derive(Debug, Clone)]
pub struct EmbeddingService {
    embedder: AnyEmbedder,
    kind: EmbeddingProviderKind,
    credentials: Credentials,
    dimension: Option<usize>,
}

impl EmbeddingService {
    #[must_use]
    pub fn new(embedder: AnyEmbedder, kind: EmbeddingProviderKind) -> Self {
        Self {
            embedder,
            kind,
            credentials: Credentials::default(),
            dimension: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// `None` accepts any length.
    #[must_use]
    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.embedder.name()
    }

    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// The key this backend needs, looked up on every call so saved keys apply at once.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Unauthorized`] when a hosted backend has no key.
    pub fn credential(&self) -> Result<Option<Secret>, RagError> {
        if self.embedder.requires_credential() {
            self.credentials.embedding(self.kind)
        } else {
            Ok(None)
        }
    }

    /// Embed `text`, checking the result against the configured dimension.
    ///
    /// A missing key surfaces as [`LlmError::MissingCredential`] without a network call.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or [`LlmError::DimensionMismatch`] for a vector of
    /// the wrong length.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let credential = self.credential().ok().flatten();
        let vector = self.embedder.embed(text, credential.as_ref()).await?;
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(LlmError::DimensionMismatch {
                provider: self.embedder.name(),
                expected,
                actual: vector.len(),
            }),
            _ => Ok(vector),
        }
    }

    /// Closure form for the ingestion pipeline.
    #[must_use]
    pub fn embed_fn(&self) -> EmbedFn {
        let service = self.clone();
        Box::new(move |text: &str| -> EmbedFuture {
            let service = service.clone();
            let owned = text.to_owned();
            Box::pin(async move { service.embed(&owned).await })
        })
    }

    /// Reachability of a local backend; see [`AnyEmbedder::health_check`].
    ///
    /// # Errors
    ///
    /// Returns an error if a local backend cannot be reached.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        self.embedder.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use ragline_llm::GenerationProviderKind;
    use ragline_llm::mock::MockEmbedder;

    use super::*;

    #[tokio::test]
    async fn wrong_length_is_an_upstream_failure() {
        let service = EmbeddingService::new(
            AnyEmbedder::Mock(MockEmbedder::with_dimension(8)),
            EmbeddingProviderKind::Ollama,
        )
        .with_dimension(Some(384));

        let err = service.embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::DimensionMismatch {
                expected: 384,
                actual: 8,
                ..
            }
        ));
        assert_eq!(RagError::Embedding(err).kind(), crate::ErrorKind::Upstream);
    }

    #[tokio::test]
    async fn unchecked_when_dimension_unset() {
        let service = EmbeddingService::new(
            AnyEmbedder::Mock(MockEmbedder::with_dimension(8)),
            EmbeddingProviderKind::Ollama,
        );
        assert_eq!(service.embed("hello").await.unwrap().len(), 8);
        assert_eq!((service.embed_fn())("hello").await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn hosted_backend_uses_current_key() {
        let service = EmbeddingService::new(
            AnyEmbedder::Mock(MockEmbedder::default().with_credential_required()),
            EmbeddingProviderKind::OpenRouter,
        );
        assert!(matches!(
            service.credential(),
            Err(RagError::Unauthorized {
                provider: "openrouter"
            })
        ));
        assert!(service.embed("hi").await.unwrap_err().is_missing_credential());

        let service = service.with_credentials(
            Credentials::new().with_key(GenerationProviderKind::OpenRouter, Secret::new("k")),
        );
        assert_eq!(service.embed("hi").await.unwrap().len(), 16);
    }
}
