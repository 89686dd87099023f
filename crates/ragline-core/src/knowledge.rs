use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragline_memory::{
    Chunker, Document, DocumentRecord, DocumentRegistry, IngestionPipeline, TextLoader,
    VectorIndex,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::embedding::EmbeddingService;
use crate::error::RagError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document_id: String,
    pub file_name: String,
    pub chunk_count: usize,
}

/// Uploads, listing and deletion of documents on top of the vector index.
pub struct KnowledgeBase {
    pipeline: IngestionPipeline,
    registry: DocumentRegistry,
    loader: TextLoader,
    upload_dir: PathBuf,
}

impl std::fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("upload_dir", &self.upload_dir)
            .field("documents", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    #[must_use]
    pub fn new(
        pipeline: IngestionPipeline,
        registry: DocumentRegistry,
        loader: TextLoader,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pipeline,
            registry,
            loader,
            upload_dir: upload_dir.into(),
        }
    }

    /// Open the registry next to the index and ingest through `embedding`.
    ///
    /// A hosted embedder without a key still opens; uploads then fail as unauthorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk settings are invalid or the registry cannot be read.
    pub async fn open(
        config: &Config,
        index: Arc<VectorIndex>,
        embedding: &EmbeddingService,
    ) -> Result<Self, RagError> {
        let chunker = Chunker::new(
            config
                .chunker_config()
                .map_err(|e| RagError::Validation(format!("{e:#}")))?,
        );
        if embedding.credential().is_err() {
            tracing::warn!(
                provider = %config.embedding.provider,
                "no API key for embedding provider, uploads fail until one is saved"
            );
        }
        let pipeline = IngestionPipeline::new(chunker, index, embedding.embed_fn());

        let registry = DocumentRegistry::open(&config.storage.vector_store_path).await?;
        let loader = TextLoader::new(config.server.max_upload_bytes as u64);

        Ok(Self::new(
            pipeline,
            registry,
            loader,
            config.storage.upload_dir.clone(),
        ))
    }

    #[must_use]
    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        self.pipeline.index()
    }

    /// Validate, ingest and store an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns a validation error for rejected files, an upstream error if embedding
    /// fails, or a storage error. Nothing is indexed or registered on failure.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RagError> {
        let file_name = base_name(file_name)?;
        let document = self.loader.decode(&file_name, bytes)?;
        self.ingest(document).await
    }

    /// Ingest a file from disk under the same rules as an upload.
    ///
    /// # Errors
    ///
    /// See [`Self::upload`]; also fails if the file cannot be read.
    pub async fn ingest_path(&self, path: &Path) -> Result<UploadResponse, RagError> {
        let document = self.loader.load(path).await?;
        self.ingest(document).await
    }

    async fn ingest(&self, document: Document) -> Result<UploadResponse, RagError> {
        let document = self.pipeline.ingest(document).await?;
        let stored = self.stored_path(&document.id, &document.file_name);

        if let Err(e) = self.save_original(&stored, &document.content).await {
            tracing::error!(
                doc_id = %document.id,
                path = %stored.display(),
                "failed to save upload: {e}"
            );
            self.rollback(&document.id, None).await;
            return Err(e.into());
        }
        if let Err(e) = self.registry.register(document.record()).await {
            tracing::error!(doc_id = %document.id, "failed to register document: {e}");
            self.rollback(&document.id, Some(&stored)).await;
            return Err(e.into());
        }

        Ok(UploadResponse {
            document_id: document.id,
            file_name: document.file_name,
            chunk_count: document.fragments.len(),
        })
    }

    /// Documents ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn list(&self) -> Result<Vec<DocumentRecord>, RagError> {
        Ok(self.registry.list()?)
    }

    /// Remove a document's record, its fragments and its stored file.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::NotFound`] for unknown ids.
    pub async fn delete(&self, id: &str) -> Result<DocumentRecord, RagError> {
        let record = self
            .registry
            .get(id)
            .ok_or_else(|| RagError::NotFound(format!("document not found: {id}")))?;

        let removed = self.index().delete_by_document(id).await?;
        let stored = self.stored_path(&record.id, &record.file_name);
        match tokio::fs::remove_file(&stored).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %stored.display(), "stored upload already gone");
            }
            Err(e) => {
                tracing::warn!(path = %stored.display(), "failed to remove stored upload: {e}");
            }
        }
        self.registry.remove(id).await?;

        tracing::info!(doc_id = id, fragments = removed, "document deleted");
        Ok(record)
    }

    #[must_use]
    pub fn stored_path(&self, id: &str, file_name: &str) -> PathBuf {
        self.upload_dir.join(format!("{id}_{file_name}"))
    }

    async fn save_original(&self, path: &Path, content: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        tokio::fs::write(path, content).await
    }

    async fn rollback(&self, doc_id: &str, stored: Option<&Path>) {
        if let Err(e) = self.index().delete_by_document(doc_id).await {
            tracing::error!(doc_id, "rollback of indexed fragments failed: {e}");
        }
        if let Some(path) = stored
            && let Err(e) = tokio::fs::remove_file(path).await
        {
            tracing::warn!(path = %path.display(), "rollback of stored upload failed: {e}");
        }
    }
}

/// Strip any directory components a client sent along with the name.
fn base_name(file_name: &str) -> Result<String, RagError> {
    Path::new(file_name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| RagError::Validation("file name is required".into()))
}
