use std::convert::Infallible;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::{Stream, stream};
use ragline_core::{
    ApiKeysUpdate, ChatRequest, ChatResponse, ModelEntry, PromptTemplate, RagError, StreamEvent,
    UploadResponse,
};
use ragline_llm::GenerationProviderKind;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::server::AppState;

/// Events buffered between the backend stream and a slow client.
const STREAM_BUFFER: usize = 32;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

#[derive(Serialize)]
struct SuccessResponse {
    success: bool,
    message: &'static str,
}

impl SuccessResponse {
    fn new(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

#[derive(Serialize)]
pub(crate) struct SystemPromptResponse {
    system_prompt: String,
    custom: bool,
}

#[derive(Deserialize)]
pub(crate) struct ModelsQuery {
    provider: Option<GenerationProviderKind>,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let (file_name, bytes) = read_file_field(&mut multipart).await?;
    tracing::debug!(file_name, size = bytes.len(), "upload received");
    let response = state.knowledge.upload(&file_name, bytes).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Vec<u8>), ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read file: {e}")))?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err(ApiError::bad_request("file is required"))
}

pub(crate) async fn list_documents_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.knowledge.list()?))
}

pub(crate) async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.knowledge.delete(&id).await?;
    Ok(SuccessResponse::new("document deleted successfully"))
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("invalid request body"))?;
    Ok(Json(state.orchestrator.chat(&request).await?))
}

/// Validation and retrieval errors come back as ordinary JSON errors; once the
/// stream is open every outcome is an event.
pub(crate) async fn chat_stream_handler(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = body.map_err(|_| ApiError::bad_request("invalid request body"))?;
    let session = state.orchestrator.prepare_stream(&request).await?;

    let cancel = state.shutdown.child_token();
    let guard = cancel.clone().drop_guard();
    let (rx, _handle) = session.spawn(cancel, STREAM_BUFFER);

    // The guard lives as long as the response body; a client disconnect drops it
    // and cancels generation.
    let events = stream::unfold((rx, guard), |(mut rx, guard)| async move {
        let event = rx.recv().await?;
        Some((Ok::<_, Infallible>(sse_event(&event)), (rx, guard)))
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default()
        .json_data(event)
        .unwrap_or_else(|_| Event::default().data(r#"{"type":"error","error":"encoding failed"}"#))
}

/// The prompt used when a request names none.
pub(crate) async fn get_system_prompt_handler(State(state): State<AppState>) -> impl IntoResponse {
    let prompts = state.orchestrator.prompts();
    Json(SystemPromptResponse {
        system_prompt: prompts.current(),
        custom: prompts.is_overridden(),
    })
}

/// Absent keys are kept, blank ones removed.
pub(crate) async fn save_api_keys_handler(
    State(state): State<AppState>,
    body: Result<Json<ApiKeysUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(update) = body.map_err(|_| ApiError::bad_request("invalid request body"))?;
    state.settings.save_api_keys(update).await?;
    Ok(SuccessResponse::new("API keys saved successfully"))
}

pub(crate) async fn get_api_keys_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.masked_api_keys())
}

pub(crate) async fn save_model_handler(
    State(state): State<AppState>,
    body: Result<Json<ModelEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<ModelEntry>), ApiError> {
    let Json(model) = body.map_err(|_| ApiError::bad_request("invalid request body"))?;
    let saved = state.settings.save_model(model).await?;
    tracing::info!(id = %saved.id, provider = %saved.provider, "model saved");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(crate) async fn list_models_handler(
    State(state): State<AppState>,
    query: Result<Query<ModelsQuery>, QueryRejection>,
) -> Result<Json<Vec<ModelEntry>>, ApiError> {
    let Query(query) = query
        .map_err(|_| ApiError::bad_request("provider must be 'openrouter' or 'bedrock'"))?;
    Ok(Json(state.settings.list_models(query.provider)))
}

pub(crate) async fn delete_model_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.settings.delete_model(&id).await? {
        return Err(RagError::NotFound(format!("model not found: {id}")).into());
    }
    Ok(SuccessResponse::new("model deleted successfully"))
}

pub(crate) async fn save_prompt_handler(
    State(state): State<AppState>,
    body: Result<Json<PromptTemplate>, JsonRejection>,
) -> Result<(StatusCode, Json<PromptTemplate>), ApiError> {
    let Json(template) = body.map_err(|_| ApiError::bad_request("invalid request body"))?;
    let saved = state.settings.save_prompt(template).await?;
    tracing::info!(id = %saved.id, default = saved.default, "system prompt saved");
    Ok((StatusCode::CREATED, Json(saved)))
}

pub(crate) async fn list_prompts_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.settings.list_prompts())
}

pub(crate) async fn default_prompt_handler(
    State(state): State<AppState>,
) -> Result<Json<PromptTemplate>, ApiError> {
    state
        .settings
        .default_prompt()
        .map(Json)
        .ok_or_else(|| RagError::NotFound("no default system prompt".into()).into())
}

pub(crate) async fn delete_prompt_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.settings.delete_prompt(&id).await? {
        return Err(RagError::NotFound(format!("system prompt not found: {id}")).into());
    }
    Ok(SuccessResponse::new("system prompt deleted successfully"))
}
