use std::path::PathBuf;

use ragline_llm::{EmbeddingProviderKind, Secret};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(skip)]
    pub secrets: ResolvedSecrets,
}

fn default_host() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    3000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Also bounds the HTTP request body.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_embedding_model() -> String {
    "all-minilm:33m".into()
}

fn default_embedding_dimensions() -> usize {
    384
}

fn default_ollama_base_url() -> String {
    ragline_llm::ollama::DEFAULT_BASE_URL.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: EmbeddingProviderKind,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector length; vectors of any other length fail ingestion.
    #[serde(default = "default_embedding_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_ollama_base_url")]
    pub ollama_base_url: String,
}

fn default_embedding_provider() -> EmbeddingProviderKind {
    EmbeddingProviderKind::Ollama
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dimensions: default_embedding_dimensions(),
            ollama_base_url: default_ollama_base_url(),
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant. Answer questions based on the provided context.";

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    #[serde(default)]
    pub bedrock: BedrockConfig,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            openrouter: OpenRouterConfig::default(),
            bedrock: BedrockConfig::default(),
        }
    }
}

fn default_openrouter_base_url() -> String {
    ragline_llm::openrouter::DEFAULT_BASE_URL.into()
}

fn default_openrouter_model() -> String {
    "anthropic/claude-3.5-sonnet".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OpenRouterConfig {
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    #[serde(default = "default_openrouter_model")]
    pub model: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_openrouter_base_url(),
            model: default_openrouter_model(),
        }
    }
}

fn default_bedrock_region() -> String {
    "eu-north-1".into()
}

fn default_bedrock_model() -> String {
    "openai.gpt-oss-20b-1:0".into()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BedrockConfig {
    #[serde(default = "default_bedrock_region")]
    pub region: String,
    #[serde(default = "default_bedrock_model")]
    pub model: String,
    /// Replaces the regional `bedrock-runtime` endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            region: default_bedrock_region(),
            model: default_bedrock_model(),
            endpoint: None,
        }
    }
}

fn default_max_context_chunks() -> usize {
    5
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_max_context_chunks")]
    pub max_context_chunks: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            max_context_chunks: default_max_context_chunks(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_vector_store_path() -> PathBuf {
    PathBuf::from("./data/vectors")
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/uploads")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory holding `vectors.json` and `documents.json`.
    #[serde(default = "default_vector_store_path")]
    pub vector_store_path: PathBuf,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            vector_store_path: default_vector_store_path(),
            upload_dir: default_upload_dir(),
        }
    }
}

/// API keys read from the environment at startup. Never serialized.
#[derive(Debug, Default, Clone)]
pub struct ResolvedSecrets {
    pub openrouter_api_key: Option<Secret>,
    pub bedrock_api_key: Option<Secret>,
    /// age identity for the settings store; a key file is generated when absent.
    pub settings_key: Option<Secret>,
}
