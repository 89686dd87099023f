use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{DeltaStream, Embedder, GenerateRequest, Generator, require_credential};
use crate::secret::Secret;
use crate::sse::bedrock_sse_to_stream;

/// AWS Bedrock runtime backend using bearer API keys.
///
/// Generation goes through the Converse API, embeddings through model invocation.
#[derive(Debug, Clone)]
pub struct BedrockProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    embedding_model: Option<String>,
}

impl BedrockProvider {
    #[must_use]
    pub fn new(region: &str, model: String) -> Self {
        Self {
            client: crate::http::default_client(),
            endpoint: runtime_endpoint(region),
            model,
            embedding_model: None,
        }
    }

    /// Point at a custom runtime endpoint (VPC endpoint, proxy, test server).
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let mut endpoint = endpoint.into();
        while endpoint.ends_with('/') {
            endpoint.pop();
        }
        self.endpoint = endpoint;
        self
    }

    #[must_use]
    pub fn with_embedding_model(mut self, model: impl Into<String>) -> Self {
        self.embedding_model = Some(model.into());
        self
    }

    async fn send<B: Serialize>(
        &self,
        model: &str,
        action: &str,
        body: &B,
        credential: &Secret,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(format!("{}/model/{model}/{action}", self.endpoint))
            .header("Authorization", format!("Bearer {}", credential.expose()))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.map_err(LlmError::Http)?;
            tracing::error!("Bedrock {action} error {status}: {text}");
            return Err(LlmError::Status {
                provider: "bedrock",
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl Generator for BedrockProvider {
    async fn generate(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> Result<String, LlmError> {
        let credential = require_credential(Some(credential), "bedrock")?;
        let model = request.model_or(&self.model);
        let body = ConverseRequest::from_prompt(request);

        tracing::debug!(model, "Bedrock converse request");
        let response = self.send(model, "converse", &body, credential).await?;
        let text = response.text().await.map_err(LlmError::Http)?;
        parse_converse_response(&text)
    }

    async fn generate_stream(
        &self,
        request: &GenerateRequest<'_>,
        credential: &Secret,
    ) -> Result<DeltaStream, LlmError> {
        let credential = require_credential(Some(credential), "bedrock")?;
        let model = request.model_or(&self.model);
        let body = ConverseRequest::from_prompt(request);

        tracing::debug!(model, "Bedrock converse-stream request");
        let response = self
            .send(model, "converse-stream", &body, credential)
            .await?;
        Ok(bedrock_sse_to_stream(response))
    }

    fn supports_streaming(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "bedrock"
    }
}

impl Embedder for BedrockProvider {
    async fn embed(&self, text: &str, credential: Option<&Secret>) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "bedrock" })?;
        let credential = require_credential(credential, "bedrock")?;

        let body = InvokeEmbeddingRequest { input_text: text };
        let response = self.send(model, "invoke", &body, credential).await?;
        let text = response.text().await.map_err(LlmError::Http)?;
        parse_embedding_response(&text)
    }

    fn requires_credential(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "bedrock"
    }
}

fn runtime_endpoint(region: &str) -> String {
    format!("https://bedrock-runtime.{region}.amazonaws.com")
}

/// Converse takes a single user turn; the system prompt is folded into it.
fn combined_prompt(request: &GenerateRequest<'_>) -> String {
    if request.system_prompt.is_empty() {
        request.message.to_owned()
    } else {
        format!(
            "System: {}\n\nUser: {}",
            request.system_prompt, request.message
        )
    }
}

/// First content block carrying non-empty text; reasoning blocks have none.
fn first_text(blocks: Vec<ContentBlock>) -> Option<String> {
    blocks
        .into_iter()
        .filter_map(|b| b.text)
        .find(|t| !t.is_empty())
}

fn parse_converse_response(body: &str) -> Result<String, LlmError> {
    let resp: ConverseResponse = serde_json::from_str(body)?;
    if let Some(message) = resp.message {
        return Err(LlmError::Api {
            provider: "bedrock",
            message,
        });
    }
    resp.output
        .and_then(|o| first_text(o.message.content))
        .ok_or(LlmError::EmptyResponse { provider: "bedrock" })
}

fn parse_embedding_response(body: &str) -> Result<Vec<f32>, LlmError> {
    let resp: InvokeEmbeddingResponse = serde_json::from_str(body)?;
    if let Some(message) = resp.message.filter(|m| !m.is_empty()) {
        return Err(LlmError::Api {
            provider: "bedrock",
            message,
        });
    }
    if resp.embedding.is_empty() {
        return Err(LlmError::EmptyEmbedding { provider: "bedrock" });
    }
    Ok(resp.embedding)
}

#[derive(Serialize)]
struct ConverseRequest {
    messages: Vec<ConverseMessageOut>,
}

impl ConverseRequest {
    fn from_prompt(request: &GenerateRequest<'_>) -> Self {
        Self {
            messages: vec![ConverseMessageOut {
                role: "user",
                content: vec![TextBlock {
                    text: combined_prompt(request),
                }],
            }],
        }
    }
}

#[derive(Serialize)]
struct ConverseMessageOut {
    role: &'static str,
    content: Vec<TextBlock>,
}

#[derive(Serialize)]
struct TextBlock {
    text: String,
}

#[derive(Deserialize)]
struct ConverseResponse {
    #[serde(default)]
    output: Option<ConverseOutput>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct ConverseOutput {
    message: ConverseMessageIn,
}

#[derive(Deserialize)]
struct ConverseMessageIn {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeEmbeddingRequest<'a> {
    input_text: &'a str,
}

#[derive(Deserialize)]
struct InvokeEmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
    #[serde(default)]
    message: Option<String>,
}
