use std::collections::HashMap;

use ragline_llm::bedrock::BedrockProvider;
use ragline_llm::ollama::OllamaEmbedder;
use ragline_llm::openrouter::OpenRouterProvider;
use ragline_llm::{AnyEmbedder, AnyGenerator, EmbeddingProviderKind, GenerationProviderKind};

use crate::config::Config;

/// The single embedding backend selected by `embedding.provider`.
#[must_use]
pub fn build_embedder(config: &Config) -> AnyEmbedder {
    let model = config.embedding.model.clone();
    match config.embedding.provider {
        EmbeddingProviderKind::Ollama => {
            AnyEmbedder::Ollama(OllamaEmbedder::new(&config.embedding.ollama_base_url, model))
        }
        EmbeddingProviderKind::OpenRouter => {
            AnyEmbedder::OpenRouter(openrouter(config).with_embedding_model(model))
        }
        EmbeddingProviderKind::Bedrock => {
            AnyEmbedder::Bedrock(bedrock(config).with_embedding_model(model))
        }
    }
}

/// One generator per hosted provider; requests pick by name.
#[must_use]
pub fn build_generators(config: &Config) -> HashMap<GenerationProviderKind, AnyGenerator> {
    GenerationProviderKind::ALL
        .into_iter()
        .map(|kind| {
            let generator = match kind {
                GenerationProviderKind::OpenRouter => AnyGenerator::OpenRouter(openrouter(config)),
                GenerationProviderKind::Bedrock => AnyGenerator::Bedrock(bedrock(config)),
            };
            (kind, generator)
        })
        .collect()
}

fn openrouter(config: &Config) -> OpenRouterProvider {
    let section = &config.generation.openrouter;
    OpenRouterProvider::new(section.base_url.clone(), section.model.clone())
}

fn bedrock(config: &Config) -> BedrockProvider {
    let section = &config.generation.bedrock;
    let provider = BedrockProvider::new(&section.region, section.model.clone());
    match &section.endpoint {
        Some(endpoint) => provider.with_endpoint(endpoint.clone()),
        None => provider,
    }
}
