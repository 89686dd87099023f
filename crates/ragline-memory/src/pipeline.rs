use std::sync::Arc;

use ragline_llm::EmbedFuture;

use crate::chunker::Chunker;
use crate::error::MemoryError;
use crate::types::{Document, Fragment};
use crate::vector_index::VectorIndex;

pub type EmbedFn = Box<dyn Fn(&str) -> EmbedFuture + Send + Sync>;

/// Chunk -> embed every fragment -> insert, all or nothing.
pub struct IngestionPipeline {
    chunker: Chunker,
    index: Arc<VectorIndex>,
    embed_fn: EmbedFn,
}

impl IngestionPipeline {
    #[must_use]
    pub fn new(chunker: Chunker, index: Arc<VectorIndex>, embed_fn: EmbedFn) -> Self {
        Self {
            chunker,
            index,
            embed_fn,
        }
    }

    #[must_use]
    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    #[must_use]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Split, embed and index `document`, returning it with its embedded fragments.
    ///
    /// Nothing reaches the index unless every fragment embedded successfully.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::EmptyDocument`] for blank text, [`MemoryError::Embedding`]
    /// naming the first failed chunk, or an index error.
    pub async fn ingest(&self, mut document: Document) -> Result<Document, MemoryError> {
        let fragments = self.chunker.split(&document.id, &document.content)?;
        let embedded = self.embed_all(fragments).await?;

        self.index.insert(embedded.clone()).await?;
        tracing::info!(
            doc_id = %document.id,
            file_name = %document.file_name,
            chunks = embedded.len(),
            "document ingested"
        );
        document.fragments = embedded;
        Ok(document)
    }

    /// Embed fragments one at a time, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// Returns [`MemoryError::Embedding`] carrying the failing fragment's ordinal.
    pub async fn embed_all(&self, fragments: Vec<Fragment>) -> Result<Vec<Fragment>, MemoryError> {
        let mut embedded = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let index = fragment.index;
            let vector = (self.embed_fn)(&fragment.content)
                .await
                .map_err(|source| MemoryError::Embedding { index, source })?;
            if vector.is_empty() {
                return Err(MemoryError::MissingEmbedding(fragment.id));
            }
            embedded.push(fragment.with_embedding(vector));
        }
        Ok(embedded)
    }
}

#[cfg(test)]
mod tests {
    use ragline_llm::mock::MockEmbedder;
    use ragline_llm::LlmError;

    use super::*;
    use crate::chunker::ChunkerConfig;

    fn chunker(size: usize, overlap: usize) -> Chunker {
        Chunker::new(ChunkerConfig::new(size, overlap).unwrap())
    }

    async fn pipeline_with(
        embedder: &MockEmbedder,
    ) -> (tempfile::TempDir, Arc<VectorIndex>, IngestionPipeline) {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(VectorIndex::open(dir.path()).await.unwrap());
        let pipeline = IngestionPipeline::new(
            chunker(10, 0),
            Arc::clone(&index),
            Box::new(embedder.embed_fn()),
        );
        (dir, index, pipeline)
    }

    #[tokio::test]
    async fn ingest_embeds_and_indexes_every_chunk() {
        let embedder = MockEmbedder::default();
        let (_dir, index, pipeline) = pipeline_with(&embedder).await;

        let doc = Document::new("a.txt", "abcdefghijklmnopqrstuvwxy");
        let doc_id = doc.id.clone();
        let ingested = pipeline.ingest(doc).await.unwrap();

        assert_eq!(ingested.fragments.len(), 3);
        assert!(ingested.fragments.iter().all(|f| f.embedding.is_some()));
        assert_eq!(index.len(), 3);
        assert!(index.all().unwrap().iter().all(|f| f.doc_id == doc_id));
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn failure_on_third_of_five_inserts_nothing() {
        let embedder = MockEmbedder::default().failing_on(2);
        let (_dir, index, pipeline) = pipeline_with(&embedder).await;

        let doc = Document::new("a.txt", "aaaaaaaaaabbbbbbbbbbccccccccccddddddddddeeeeeeeeee");
        let err = pipeline.ingest(doc).await.unwrap_err();

        assert!(matches!(err, MemoryError::Embedding { index: 2, .. }));
        assert!(index.is_empty());
        assert!(!index.snapshot_path().exists());
        // short-circuits: fragments 4 and 5 are never sent
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn blank_document_rejected_before_embedding() {
        let embedder = MockEmbedder::default();
        let (_dir, _index, pipeline) = pipeline_with(&embedder).await;
        let err = pipeline
            .ingest(Document::new("a.txt", "   \n\t"))
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::EmptyDocument));
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn dimension_change_rejected_by_index() {
        let (_dir, index, pipeline) = pipeline_with(&MockEmbedder::with_dimension(8)).await;
        pipeline.ingest(Document::new("a.txt", "hello")).await.unwrap();

        let wider = IngestionPipeline::new(
            chunker(10, 0),
            Arc::clone(&index),
            Box::new(MockEmbedder::with_dimension(12).embed_fn()),
        );
        let err = wider
            .ingest(Document::new("b.txt", "world"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 8,
                actual: 12
            }
        ));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn embed_error_keeps_llm_source() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(VectorIndex::open(dir.path()).await.unwrap());
        let failing: EmbedFn = Box::new(|_text: &str| {
            Box::pin(async move { Err(LlmError::Other("mock embed error".into())) })
        });
        let pipeline = IngestionPipeline::new(chunker(100, 10), index, failing);

        let err = pipeline
            .ingest(Document::new("a.txt", "some text"))
            .await
            .unwrap_err();
        let MemoryError::Embedding { index, source } = err else {
            panic!("expected embedding error");
        };
        assert_eq!(index, 0);
        assert!(matches!(source, LlmError::Other(_)));
    }
}
