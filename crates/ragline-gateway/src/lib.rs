//! HTTP API over the retrieval core: uploads, documents, chat and streamed chat.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError};
pub use router::build_router;
pub use server::{AppState, GatewayServer};
