//! Configuration, runtime settings, retrieval orchestration and the knowledge base facade.

pub mod config;
pub mod credentials;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod settings;
pub mod tokens;

pub use config::Config;
pub use credentials::Credentials;
pub use embedding::EmbeddingService;
pub use error::{ErrorKind, RagError};
pub use knowledge::{KnowledgeBase, UploadResponse};
pub use orchestrator::{
    ChatRequest, ChatResponse, Orchestrator, StreamEvent, StreamOutcome, StreamSession,
};
pub use prompt::SystemPrompts;
pub use settings::{
    ApiKeysUpdate, MaskedApiKeys, ModelEntry, PromptTemplate, SettingsError, SettingsStore,
};
pub use tokens::TokenMetrics;
