//! Test-only mock backends.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;

use crate::error::LlmError;
use crate::provider::{DeltaStream, EmbedFuture, Embedder, GenerateRequest, Generator};
use crate::secret::Secret;

/// Deterministic embedder: a bag-of-characters vector of fixed dimension, so texts
/// sharing characters land close together.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    pub dimension: usize,
    pub requires_credential: bool,
    /// Fail the call with this zero-based ordinal.
    pub fail_on_call: Option<usize>,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self {
            dimension: 16,
            requires_credential: false,
            fail_on_call: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl MockEmbedder {
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing_on(mut self, call: usize) -> Self {
        self.fail_on_call = Some(call);
        self
    }

    #[must_use]
    pub fn with_credential_required(mut self) -> Self {
        self.requires_credential = true;
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Closure form for ingestion pipelines, embedding without a credential.
    pub fn embed_fn(&self) -> impl Fn(&str) -> EmbedFuture + Send + Sync + use<> {
        let embedder = self.clone();
        move |text: &str| -> EmbedFuture {
            let e = embedder.clone();
            let owned = text.to_owned();
            Box::pin(async move { e.embed(&owned, None).await })
        }
    }

    #[must_use]
    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimension.max(1)];
        for c in text.chars().filter(|c| !c.is_whitespace()) {
            let slot = (c.to_ascii_lowercase() as usize) % v.len();
            v[slot] += 1.0;
        }
        v
    }
}

impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str, credential: Option<&Secret>) -> Result<Vec<f32>, LlmError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.requires_credential && credential.is_none_or(Secret::is_blank) {
            return Err(LlmError::MissingCredential { provider: "mock" });
        }
        if self.fail_on_call == Some(call) {
            return Err(LlmError::Other(format!("mock embed failure on call {call}")));
        }
        Ok(self.vector_for(text))
    }

    fn requires_credential(&self) -> bool {
        self.requires_credential
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Debug, Clone)]
pub struct MockGenerator {
    pub response: String,
    pub deltas: Vec<String>,
    pub streaming: bool,
    pub fail_generate: bool,
    /// Emit this many deltas, then fail the stream.
    pub fail_after: Option<usize>,
    /// Milliseconds to sleep before each delta.
    pub delay_ms: u64,
    last_system_prompt: Arc<Mutex<Option<String>>>,
    last_model: Arc<Mutex<Option<String>>>,
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self {
            response: "mock response".into(),
            deltas: vec!["mock ".into(), "response".into()],
            streaming: false,
            fail_generate: false,
            fail_after: None,
            delay_ms: 0,
            last_system_prompt: Arc::new(Mutex::new(None)),
            last_model: Arc::new(Mutex::new(None)),
        }
    }
}

impl MockGenerator {
    #[must_use]
    pub fn with_response(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn streaming(deltas: &[&str]) -> Self {
        Self {
            response: deltas.concat(),
            deltas: deltas.iter().map(|d| (*d).to_owned()).collect(),
            streaming: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_generate: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn fail_after(mut self, deltas: usize) -> Self {
        self.fail_after = Some(deltas);
        self
    }

    #[must_use]
    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    #[must_use]
    pub fn last_system_prompt(&self) -> Option<String> {
        self.last_system_prompt.lock().unwrap().clone()
    }

    #[must_use]
    pub fn last_model(&self) -> Option<String> {
        self.last_model.lock().unwrap().clone()
    }

    fn record(&self, request: &GenerateRequest<'_>) {
        *self.last_system_prompt.lock().unwrap() = Some(request.system_prompt.to_owned());
        *self.last_model.lock().unwrap() = request.model.map(str::to_owned);
    }
}

impl Generator for MockGenerator {
    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        _credential: &Secret,
    ) -> Result<String, LlmError> {
        self.record(request);
        if self.fail_generate {
            return Err(LlmError::Other("mock generation error".into()));
        }
        Ok(self.response.clone())
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest<'_>,
        _credential: &Secret,
    ) -> Result<DeltaStream, LlmError> {
        self.record(request);
        if !self.streaming {
            return Err(LlmError::StreamUnsupported { provider: "mock" });
        }
        if self.fail_generate {
            return Err(LlmError::Other("mock generation error".into()));
        }

        let mut items: Vec<Result<String, LlmError>> =
            self.deltas.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(LlmError::Other("mock stream interrupted".into())));
        }

        let delay = Duration::from_millis(self.delay_ms);
        let stream = futures::stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            item
        });
        Ok(Box::pin(stream))
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
