use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{DeltaStream, Embedder, GenerateRequest, Generator, require_credential};
use crate::secret::Secret;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const APP_REFERER: &str = "https://github.com/ragline/ragline";
const APP_TITLE: &str = "ragline";

/// Hosted OpenRouter backend: chat completions and embeddings. The API key is
/// supplied per call, never stored here.
#[derive(Debug, Clone)]
pub struct OpenRouterProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    embedding_model: Option<String>,
}

impl OpenRouterProvider {
    #[must_use]
    pub fn new(mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            base_url,
            model,
            embedding_model: None,
        }
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn post<B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
        credential: &Secret,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{endpoint}", self.base_url))
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!("OpenRouter API error {status} on /{endpoint}: {text}");
            return Err(LlmError::Status {
                provider: "openrouter",
                status: status.as_u16(),
            });
        }

        Ok(text)
    }
}

impl Generator for OpenRouterProvider {
    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> Result<String, LlmError> {
        let credential = require_credential(Some(credential), "openrouter")?;
        let model = request.model_or(&self.model);
        let body = ChatRequest {
            model,
            messages: chat_messages(request),
            stream: false,
        };

        tracing::debug!(model, "OpenRouter chat request");
        let text = self.post("chat/completions", &body, credential).await?;
        parse_chat_response(&text)
    }

    async fn generate_stream(
        &self,
        _request: &GenerateRequest<'_>,
        _credential: &Secret,
    ) -> Result<DeltaStream, LlmError> {
        Err(LlmError::StreamUnsupported {
            provider: "openrouter",
        })
    }

    fn supports_streaming(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

impl Embedder for OpenRouterProvider {
    async fn embed(&self, text: &str, credential: Option<&Secret>) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported {
                provider: "openrouter",
            })?;
        let credential = require_credential(credential, "openrouter")?;

        let body = EmbeddingRequest { model, input: text };
        let text = self.post("embeddings", &body, credential).await?;
        parse_embedding_response(&text)
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "openrouter"
    }
}

fn chat_messages<'a>(request: &GenerateRequest<'a>) -> Vec<ApiMessage<'a>> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(ApiMessage {
            role: "system",
            content: request.system_prompt,
        });
    }
    messages.push(ApiMessage {
        role: "user",
        content: request.message,
    });
    messages
}

fn parse_chat_response(body: &str) -> Result<String, LlmError> {
    let resp: ChatResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(LlmError::Api {
            provider: "openrouter",
            message: err.message,
        });
    }
    resp.choices
        .into_iter()
        .map(|c| c.message.content)
        .find(|content| !content.is_empty())
        .ok_or(LlmError::EmptyResponse {
            provider: "openrouter",
        })
}

fn parse_embedding_response(body: &str) -> Result<Vec<f32>, LlmError> {
    let resp: EmbeddingResponse = serde_json::from_str(body)?;
    if let Some(err) = resp.error {
        return Err(LlmError::Api {
            provider: "openrouter",
            message: err.message,
        });
    }
    let embedding = resp
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or(LlmError::EmptyResponse {
            provider: "openrouter",
        })?;
    if embedding.is_empty() {
        return Err(LlmError::EmptyEmbedding {
            provider: "openrouter",
        });
    }
    Ok(embedding)
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}
