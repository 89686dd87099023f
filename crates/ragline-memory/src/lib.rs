//! Fragments, chunking, the snapshot-persisted vector index and document ingestion.

pub mod chunker;
pub mod error;
pub mod loader;
pub mod pipeline;
pub mod registry;
pub mod snapshot;
pub mod types;
pub mod vector_index;

pub use chunker::{Chunker, ChunkerConfig};
pub use error::MemoryError;
pub use loader::{DEFAULT_MAX_FILE_SIZE, TextLoader};
pub use pipeline::{EmbedFn, IngestionPipeline};
pub use registry::DocumentRegistry;
pub use types::{Document, DocumentRecord, Fragment, SimilarityResult};
pub use vector_index::{VectorIndex, cosine_similarity};
