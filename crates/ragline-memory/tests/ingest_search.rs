use std::sync::Arc;

use ragline_llm::mock::MockEmbedder;
use ragline_memory::{
    Chunker, ChunkerConfig, DocumentRegistry, IngestionPipeline, TextLoader, VectorIndex,
};

#[tokio::test]
async fn ingest_search_delete_reload() {
    let dir = tempfile::tempdir().unwrap();
    let index = Arc::new(VectorIndex::open(dir.path()).await.unwrap());
    let registry = DocumentRegistry::open(dir.path()).await.unwrap();

    let embedder = MockEmbedder::with_dimension(32);
    let pipeline = IngestionPipeline::new(
        Chunker::new(ChunkerConfig::new(40, 8).unwrap()),
        Arc::clone(&index),
        Box::new(embedder.embed_fn()),
    );

    let loader = TextLoader::default();
    let rust = loader
        .decode(
            "rust.md",
            b"Rust guarantees memory safety without a garbage collector.".to_vec(),
        )
        .unwrap();
    let bees = loader
        .decode(
            "bees.txt",
            b"Honeybees communicate the location of flowers by dancing.".to_vec(),
        )
        .unwrap();

    let rust = pipeline.ingest(rust).await.unwrap();
    let bees = pipeline.ingest(bees).await.unwrap();
    registry.register(rust.record()).await.unwrap();
    registry.register(bees.record()).await.unwrap();

    let query = embedder.vector_for(&rust.fragments[0].content);
    let top = index.search(&query, 1).unwrap();
    assert_eq!(top[0].fragment.doc_id, rust.id);
    assert!((top[0].score - 1.0).abs() < 1e-6);

    assert!(index.delete_by_document(&rust.id).await.unwrap() > 0);
    registry.remove(&rust.id).await.unwrap();
    drop(index);
    drop(registry);

    let index = VectorIndex::open(dir.path()).await.unwrap();
    let registry = DocumentRegistry::open(dir.path()).await.unwrap();
    assert!(index.all().unwrap().iter().all(|f| f.doc_id == bees.id));
    assert_eq!(index.len(), bees.fragments.len());
    let listed: Vec<String> = registry.list().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(listed, vec![bees.id]);
}
