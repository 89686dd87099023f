//! Embedding and generation backends behind closed dispatch enums.

pub mod any;
pub mod bedrock;
pub mod error;
pub mod http;
pub mod kind;
#[cfg(feature = "mock")]
pub mod mock;
pub mod ollama;
pub mod openrouter;
pub mod provider;
pub mod secret;
mod sse;

pub use any::{AnyEmbedder, AnyGenerator};
pub use error::LlmError;
pub use kind::{EmbeddingProviderKind, GenerationProviderKind};
pub use provider::{DeltaStream, EmbedFuture, Embedder, GenerateRequest, Generator};
pub use secret::Secret;
