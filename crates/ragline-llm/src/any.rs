use crate::bedrock::BedrockProvider;
use crate::error::LlmError;
#[cfg(feature = "mock")]
use crate::mock::{MockEmbedder, MockGenerator};
use crate::ollama::OllamaEmbedder;
use crate::openrouter::OpenRouterProvider;
use crate::provider::{DeltaStream, Embedder, GenerateRequest, Generator};
use crate::secret::Secret;

/// Generates a match over all `AnyEmbedder` variants, binding the inner backend
/// and evaluating the given expression for each arm.
macro_rules! delegate_embedder {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyEmbedder::Ollama($p) => $expr,
            AnyEmbedder::OpenRouter($p) => $expr,
            AnyEmbedder::Bedrock($p) => $expr,
            #[cfg(feature = "mock")]
            AnyEmbedder::Mock($p) => $expr,
        }
    };
}

macro_rules! delegate_generator {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyGenerator::OpenRouter($p) => $expr,
            AnyGenerator::Bedrock($p) => $expr,
            #[cfg(feature = "mock")]
            AnyGenerator::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyEmbedder {
    Ollama(OllamaEmbedder),
    OpenRouter(OpenRouterProvider),
    Bedrock(BedrockProvider),
    #[cfg(feature = "mock")]
    Mock(MockEmbedder),
}

impl AnyEmbedder {
    /// Reachability check for local backends; hosted ones are only checked on use.
    ///
    /// # Errors
    ///
    /// Returns an error if a local backend cannot be reached.
    pub async fn health_check(&self) -> Result<(), LlmError> {
        match self {
            Self::Ollama(ollama) => ollama.health_check().await,
            _ => Ok(()),
        }
    }
}

impl Embedder for AnyEmbedder {
    async fn embed(&self, text: &str, credential: Option<&Secret>) -> Result<Vec<f32>, LlmError> {
        delegate_embedder!(self, |p| p.embed(text, credential).await)
    }

    fn requires_credential(&self) -> bool {
        delegate_embedder!(self, |p| Embedder::requires_credential(p))
    }

    fn name(&self) -> &'static str {
        delegate_embedder!(self, |p| Embedder::name(p))
    }
}

#[derive(Debug, Clone)]
pub enum AnyGenerator {
    OpenRouter(OpenRouterProvider),
    Bedrock(BedrockProvider),
    #[cfg(feature = "mock")]
    Mock(MockGenerator),
}

impl Generator for AnyGenerator {
    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> Result<String, LlmError> {
        delegate_generator!(self, |p| p.generate(request, credential).await)
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> Result<DeltaStream, LlmError> {
        delegate_generator!(self, |p| p.generate_stream(request, credential).await)
    }

    fn supports_streaming(&self) -> bool {
        delegate_generator!(self, |p| p.supports_streaming())
    }

    fn name(&self) -> &'static str {
        delegate_generator!(self, |p| Generator::name(p))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openrouter() -> OpenRouterProvider {
        OpenRouterProvider::new("http://127.0.0.1:1".into(), "m".into()).with_embedding_model("e")
    }

    #[test]
    fn any_embedder_names() {
        let ollama = AnyEmbedder::Ollama(OllamaEmbedder::new("http://localhost:11434", "e".into()));
        assert_eq!(ollama.name(), "ollama");
        assert!(!ollama.requires_credential());

        let hosted = AnyEmbedder::OpenRouter(openrouter());
        assert_eq!(hosted.name(), "openrouter");
        assert!(hosted.requires_credential());

        let bedrock = AnyEmbedder::Bedrock(BedrockProvider::new("eu-north-1", "m".into()));
        assert_eq!(bedrock.name(), "bedrock");
    }

    #[test]
    fn any_generator_streaming_support() {
        assert!(!AnyGenerator::OpenRouter(openrouter()).supports_streaming());
        assert!(
            AnyGenerator::Bedrock(BedrockProvider::new("eu-north-1", "m".into()))
                .supports_streaming()
        );
    }

    #[tokio::test]
    async fn embed_forwards_credential() {
        let embedder = AnyEmbedder::OpenRouter(openrouter());
        let err = embedder.embed("hi", None).await.unwrap_err();
        assert!(err.is_missing_credential());

        // With a key the call proceeds to the (unreachable) network.
        let err = embedder
            .embed("hi", Some(&Secret::new("k")))
            .await
            .unwrap_err();
        assert!(!err.is_missing_credential());
    }

    #[tokio::test]
    async fn health_check_only_contacts_local_backend() {
        assert!(AnyEmbedder::OpenRouter(openrouter()).health_check().await.is_ok());

        let ollama = AnyEmbedder::Ollama(OllamaEmbedder::new("http://127.0.0.1:1", "e".into()));
        assert!(ollama.health_check().await.is_err());
    }

    #[tokio::test]
    async fn any_generator_stream_unsupported_passthrough() {
        let generator = AnyGenerator::OpenRouter(openrouter());
        let result = generator
            .generate_stream(&GenerateRequest::new("", "hi"), &Secret::new("k"))
            .await;
        assert!(matches!(result, Err(LlmError::StreamUnsupported { .. })));
    }
}
