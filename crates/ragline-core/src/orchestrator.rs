use std::collections::HashMap;
use std::sync::Arc;

use futures::StreamExt;
use ragline_llm::{
    AnyGenerator, GenerateRequest, GenerationProviderKind, Generator, LlmError, Secret,
};
use ragline_memory::VectorIndex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::credentials::Credentials;
use crate::embedding::EmbeddingService;
use crate::error::RagError;
use crate::prompt::{self, SystemPrompts};
use crate::providers;
use crate::settings::SettingsStore;
use crate::tokens::TokenMetrics;

const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    /// `openrouter` or `bedrock`.
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(message: impl Into<String>, provider: GenerationProviderKind) -> Self {
        Self {
            message: message.into(),
            provider: provider.as_str().to_owned(),
            model: None,
            system_prompt: None,
        }
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    /// Retrieved fragment texts, best match first.
    pub context: Vec<String>,
    pub token_metrics: TokenMetrics,
}

/// One frame of a streamed answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Context { context: Vec<String> },
    Chunk { text: String },
    Done,
    Error { error: String },
}

impl StreamEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}

/// How a streamed answer ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed { chunks: usize },
    Failed(String),
    Cancelled,
    /// The consumer dropped its receiver; the backend stream was dropped with it.
    Disconnected,
}

/// Everything decided before generation: validated inputs, credentials, retrieved context.
struct Prepared {
    provider: GenerationProviderKind,
    generator: AnyGenerator,
    credential: Secret,
    system_prompt: String,
    message: String,
    model: Option<String>,
    context: Vec<String>,
}

/// Embeds the query, retrieves context and calls the generation backend.
pub struct Orchestrator {
    index: Arc<VectorIndex>,
    embedding: EmbeddingService,
    generators: HashMap<GenerationProviderKind, AnyGenerator>,
    credentials: Credentials,
    prompts: Arc<SystemPrompts>,
    top_k: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("embedder", &self.embedding.name())
            .field("generators", &self.generators.keys().collect::<Vec<_>>())
            .field("top_k", &self.top_k)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    #[must_use]
    pub fn new(index: Arc<VectorIndex>, embedding: EmbeddingService) -> Self {
        Self {
            index,
            embedding,
            generators: HashMap::new(),
            credentials: Credentials::default(),
            prompts: Arc::new(SystemPrompts::new(crate::config::DEFAULT_SYSTEM_PROMPT)),
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Wire every backend named in `config`, with keys and the default prompt read
    /// through `settings` first.
    #[must_use]
    pub fn from_config(
        config: &Config,
        index: Arc<VectorIndex>,
        settings: &Arc<SettingsStore>,
    ) -> Self {
        let credentials =
            Credentials::from_secrets(&config.secrets).with_settings(Arc::clone(settings));
        let embedding =
            EmbeddingService::new(providers::build_embedder(config), config.embedding.provider)
                .with_credentials(credentials.clone())
                .with_dimension(Some(config.embedding.dimensions));
        let prompts = SystemPrompts::new(config.generation.system_prompt.clone())
            .with_settings(Arc::clone(settings));

        let mut orchestrator = Self::new(index, embedding)
            .with_credentials(credentials)
            .with_prompts(Arc::new(prompts))
            .with_top_k(config.retrieval.max_context_chunks);

        for (kind, generator) in providers::build_generators(config) {
            orchestrator = orchestrator.with_generator(kind, generator);
        }
        orchestrator
    }

    #[must_use]
    pub fn with_generator(mut self, kind: GenerationProviderKind, generator: AnyGenerator) -> Self {
        self.generators.insert(kind, generator);
        self
    }

    /// Keys for generation; the embedding service carries its own.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: Arc<SystemPrompts>) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k.max(1);
        self
    }

    #[must_use]
    pub fn prompts(&self) -> &Arc<SystemPrompts> {
        &self.prompts
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[must_use]
    pub fn embedding(&self) -> &EmbeddingService {
        &self.embedding
    }

    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Answer in one piece.
    ///
    /// # Errors
    ///
    /// Validation and credential errors are returned before any backend call; embedding
    /// and generation failures are returned as upstream errors.
    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, RagError> {
        let prepared = self.prepare(request, false).await?;
        let generate = GenerateRequest::new(&prepared.system_prompt, &prepared.message)
            .with_model(prepared.model.as_deref());

        let message = prepared
            .generator
            .generate(&generate, &prepared.credential)
            .await
            .map_err(|e| {
                tracing::error!(provider = %prepared.provider, "generation failed: {e}");
                RagError::Generation(e)
            })?;

        let token_metrics =
            TokenMetrics::estimate(&prepared.system_prompt, &prepared.message, &message);
        tracing::info!(
            provider = %prepared.provider,
            context_chunks = prepared.context.len(),
            total_tokens = token_metrics.total_tokens,
            "chat request completed"
        );

        Ok(ChatResponse {
            message,
            context: prepared.context,
            token_metrics,
        })
    }

    /// Run every step that can fail as an ordinary request error, then hand back a
    /// session that streams the answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::StreamUnsupported`] for providers without streaming, plus every
    /// error [`Self::chat`] returns before generation.
    pub async fn prepare_stream(&self, request: &ChatRequest) -> Result<StreamSession, RagError> {
        let prepared = self.prepare(request, true).await?;
        Ok(StreamSession { prepared })
    }

    async fn prepare(&self, request: &ChatRequest, streaming: bool) -> Result<Prepared, RagError> {
        if request.message.trim().is_empty() {
            return Err(RagError::Validation("message is required".into()));
        }
        let provider: GenerationProviderKind = request.provider.parse().map_err(|_| {
            RagError::Validation("provider must be 'openrouter' or 'bedrock'".into())
        })?;
        let generator = self.generators.get(&provider).cloned().ok_or_else(|| {
            RagError::Validation(format!("provider {provider} is not configured"))
        })?;
        if streaming && !generator.supports_streaming() {
            return Err(RagError::StreamUnsupported {
                provider: provider.as_str(),
            });
        }
        let credential = self.credentials.generation(provider)?;
        self.embedding.credential()?;

        tracing::debug!(%provider, streaming, "processing chat request");

        let query = self
            .embedding
            .embed(&request.message)
            .await
            .map_err(|e| {
                tracing::error!("failed to generate query embedding: {e}");
                RagError::Embedding(e)
            })?;
        let results = self.index.search(&query, self.top_k)?;
        let context: Vec<String> = results.into_iter().map(|r| r.fragment.content).collect();

        let base = self.prompts.resolve(request.system_prompt.as_deref());
        let system_prompt = prompt::augment(&base, &prompt::context_block(&context));

        Ok(Prepared {
            provider,
            generator,
            credential,
            system_prompt,
            message: request.message.clone(),
            model: request.model.clone().filter(|m| !m.trim().is_empty()),
            context,
        })
    }
}

/// A validated streamed request, ready to produce events.
pub struct StreamSession {
    prepared: Prepared,
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("provider", &self.prepared.provider)
            .field("context", &self.prepared.context.len())
            .finish_non_exhaustive()
    }
}

impl StreamSession {
    #[must_use]
    pub fn context(&self) -> &[String] {
        &self.prepared.context
    }

    #[must_use]
    pub fn provider(&self) -> GenerationProviderKind {
        self.prepared.provider
    }

    /// Push `context`, then each delta as `chunk`, then exactly one of `done` or `error`.
    ///
    /// `cancel` is checked between deltas. A closed sink stops the run and drops the
    /// backend stream.
    pub async fn run(
        self,
        sink: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        let Prepared {
            provider,
            generator,
            credential,
            system_prompt,
            message,
            model,
            context,
        } = self.prepared;

        if sink.send(StreamEvent::Context { context }).await.is_err() {
            return StreamOutcome::Disconnected;
        }

        let request = GenerateRequest::new(&system_prompt, &message).with_model(model.as_deref());
        let opened = tokio::select! {
            r = generator.generate_stream(&request, &credential) => r,
            () = cancel.cancelled() => return cancelled(&sink, provider).await,
        };
        let mut stream = match opened {
            Ok(stream) => stream,
            Err(e) => return failed(&sink, provider, &e).await,
        };

        let mut chunks = 0usize;
        loop {
            let item = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(&sink, provider).await,
                item = stream.next() => item,
            };
            match item {
                Some(Ok(delta)) => {
                    if delta.is_empty() {
                        continue;
                    }
                    if sink.send(StreamEvent::Chunk { text: delta }).await.is_err() {
                        tracing::info!(%provider, chunks, "stream consumer disconnected");
                        return StreamOutcome::Disconnected;
                    }
                    chunks += 1;
                }
                Some(Err(e)) => return failed(&sink, provider, &e).await,
                None => break,
            }
        }

        if sink.send(StreamEvent::Done).await.is_err() {
            return StreamOutcome::Disconnected;
        }
        tracing::info!(%provider, chunks, "streaming chat request completed");
        StreamOutcome::Completed { chunks }
    }

    /// Run on a background task, returning the event receiver and the task handle.
    #[must_use]
    pub fn spawn(
        self,
        cancel: CancellationToken,
        buffer: usize,
    ) -> (mpsc::Receiver<StreamEvent>, JoinHandle<StreamOutcome>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let handle = tokio::spawn(self.run(tx, cancel));
        (rx, handle)
    }
}

async fn failed(
    sink: &mpsc::Sender<StreamEvent>,
    provider: GenerationProviderKind,
    error: &LlmError,
) -> StreamOutcome {
    tracing::error!(%provider, "streaming failed: {error}");
    let message = error.to_string();
    let _ = sink
        .send(StreamEvent::Error {
            error: message.clone(),
        })
        .await;
    StreamOutcome::Failed(message)
}

async fn cancelled(
    sink: &mpsc::Sender<StreamEvent>,
    provider: GenerationProviderKind,
) -> StreamOutcome {
    tracing::info!(%provider, "streaming interrupted by cancellation");
    let _ = sink
        .send(StreamEvent::Error {
            error: "request cancelled".into(),
        })
        .await;
    StreamOutcome::Cancelled
}
