use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    chat_handler, chat_stream_handler, default_prompt_handler, delete_document_handler,
    delete_model_handler, delete_prompt_handler, get_api_keys_handler, get_system_prompt_handler,
    health_handler, list_documents_handler, list_models_handler, list_prompts_handler,
    save_api_keys_handler, save_model_handler, save_prompt_handler, upload_handler,
};
use super::server::AppState;

/// Every route lives under `/api/v1`. Bodies above `max_body_size` are rejected with 413
/// before a handler runs.
pub fn build_router(state: AppState, max_body_size: usize) -> Router {
    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/upload", post(upload_handler))
        .route("/documents", get(list_documents_handler))
        .route("/documents/{id}", delete(delete_document_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/system-prompt", get(get_system_prompt_handler))
        .route(
            "/settings/api-keys",
            get(get_api_keys_handler).post(save_api_keys_handler),
        )
        .route(
            "/settings/models",
            get(list_models_handler).post(save_model_handler),
        )
        .route("/settings/models/{id}", delete(delete_model_handler))
        .route(
            "/settings/system-prompts",
            get(list_prompts_handler).post(save_prompt_handler),
        )
        .route("/settings/system-prompts/default", get(default_prompt_handler))
        .route("/settings/system-prompts/{id}", delete(delete_prompt_handler));

    Router::new()
        .nest("/api/v1", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
