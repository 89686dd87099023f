use std::sync::Arc;
use std::time::Duration;

use ragline_core::{
    ApiKeysUpdate, ChatRequest, Config, Credentials, EmbeddingService, ErrorKind, KnowledgeBase,
    Orchestrator, PromptTemplate, SettingsStore, StreamEvent, StreamOutcome, SystemPrompts,
};
use ragline_llm::mock::{MockEmbedder, MockGenerator};
use ragline_llm::{AnyEmbedder, AnyGenerator, GenerationProviderKind, Secret};
use ragline_memory::VectorIndex;
use tokio_util::sync::CancellationToken;

const BEDROCK: GenerationProviderKind = GenerationProviderKind::Bedrock;
const OPENROUTER: GenerationProviderKind = GenerationProviderKind::OpenRouter;

const BEES: &str = "Honey bees dance in the hive to show where the flowers are.";
const RUST: &str = "Rust moves ownership of a value when it is assigned to a new binding.";

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.storage.vector_store_path = dir.join("vectors");
    config.storage.upload_dir = dir.join("uploads");
    config.embedding.dimensions = 16;
    config.retrieval.max_context_chunks = 1;
    config
}

async fn open(
    config: &Config,
    embedder: MockEmbedder,
    generator: MockGenerator,
) -> (Orchestrator, Arc<KnowledgeBase>) {
    let index = Arc::new(
        VectorIndex::open(&config.storage.vector_store_path)
            .await
            .unwrap(),
    );
    let settings = Arc::new(
        SettingsStore::open(&config.storage.vector_store_path, None)
            .await
            .unwrap(),
    );
    let credentials = Credentials::new()
        .with_key(BEDROCK, Secret::new("test-key"))
        .with_settings(Arc::clone(&settings));
    let embedding = EmbeddingService::new(AnyEmbedder::Mock(embedder), config.embedding.provider)
        .with_credentials(credentials.clone())
        .with_dimension(Some(config.embedding.dimensions));

    let knowledge = KnowledgeBase::open(config, Arc::clone(&index), &embedding)
        .await
        .unwrap();
    let prompts = SystemPrompts::new(config.generation.system_prompt.clone()).with_settings(settings);
    let orchestrator = Orchestrator::new(index, embedding)
        .with_generator(BEDROCK, AnyGenerator::Mock(generator))
        .with_generator(OPENROUTER, AnyGenerator::Mock(MockGenerator::default()))
        .with_credentials(credentials)
        .with_prompts(Arc::new(prompts))
        .with_top_k(config.retrieval.max_context_chunks);
    (orchestrator, Arc::new(knowledge))
}

async fn collect(orchestrator: &Orchestrator, request: &ChatRequest) -> Vec<StreamEvent> {
    let session = orchestrator.prepare_stream(request).await.unwrap();
    let (mut rx, handle) = session.spawn(CancellationToken::new(), 8);
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    assert!(matches!(
        handle.await.unwrap(),
        StreamOutcome::Completed { .. }
    ));
    events
}

#[tokio::test]
async fn ingest_then_ask_uses_retrieved_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let generator = MockGenerator::with_response("They dance.");
    let (orchestrator, knowledge) =
        open(&config, MockEmbedder::default(), generator.clone()).await;

    knowledge.upload("bees.md", BEES.as_bytes().to_vec()).await.unwrap();
    knowledge.upload("rust.txt", RUST.as_bytes().to_vec()).await.unwrap();

    let response = orchestrator
        .chat(&ChatRequest::new(BEES, BEDROCK))
        .await
        .unwrap();
    assert_eq!(response.message, "They dance.");
    assert_eq!(response.context, vec![BEES.to_owned()]);
    assert!(response.token_metrics.output_tokens > 0);

    let prompt = generator.last_system_prompt().unwrap();
    assert!(prompt.starts_with(&config.generation.system_prompt));
    assert!(prompt.contains("KNOWLEDGE BASE:"));
    assert!(prompt.contains(BEES));
    assert!(!prompt.contains(RUST));
}

#[tokio::test]
async fn knowledge_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let uploaded = {
        let (_, knowledge) = open(&config, MockEmbedder::default(), MockGenerator::default()).await;
        knowledge.upload("rust.txt", RUST.as_bytes().to_vec()).await.unwrap()
    };

    let (orchestrator, knowledge) =
        open(&config, MockEmbedder::default(), MockGenerator::default()).await;
    let documents = knowledge.list().unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].id, uploaded.document_id);
    assert_eq!(documents[0].chunk_count, uploaded.chunk_count);
    assert!(
        knowledge
            .stored_path(&uploaded.document_id, "rust.txt")
            .exists()
    );

    let response = orchestrator
        .chat(&ChatRequest::new(RUST, BEDROCK))
        .await
        .unwrap();
    assert_eq!(response.context, vec![RUST.to_owned()]);
}

#[tokio::test]
async fn deleted_document_no_longer_answers() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let (orchestrator, knowledge) =
        open(&config, MockEmbedder::default(), MockGenerator::default()).await;

    let bees = knowledge.upload("bees.md", BEES.as_bytes().to_vec()).await.unwrap();
    knowledge.upload("rust.txt", RUST.as_bytes().to_vec()).await.unwrap();

    knowledge.delete(&bees.document_id).await.unwrap();
    let response = orchestrator
        .chat(&ChatRequest::new(BEES, BEDROCK))
        .await
        .unwrap();
    assert_eq!(response.context, vec![RUST.to_owned()]);

    let err = knowledge.delete(&bees.document_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn failed_embedding_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.retrieval.chunk_size = 20;
    config.retrieval.chunk_overlap = 5;
    let embedder = MockEmbedder::default().failing_on(1);
    let (orchestrator, knowledge) = open(&config, embedder, MockGenerator::default()).await;

    let err = knowledge
        .upload("bees.md", BEES.as_bytes().to_vec())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);

    assert!(knowledge.list().unwrap().is_empty());
    assert!(orchestrator.index().is_empty());
    let stored = std::fs::read_dir(&config.storage.upload_dir)
        .map(Iterator::count)
        .unwrap_or(0);
    assert_eq!(stored, 0);
}

#[tokio::test]
async fn streamed_answer_follows_context() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let generator = MockGenerator::streaming(&["They ", "dance", "."]);
    let (orchestrator, knowledge) = open(&config, MockEmbedder::default(), generator).await;
    knowledge.upload("bees.md", BEES.as_bytes().to_vec()).await.unwrap();

    let events = collect(&orchestrator, &ChatRequest::new(BEES, BEDROCK)).await;
    assert_eq!(
        events,
        vec![
            StreamEvent::Context {
                context: vec![BEES.to_owned()]
            },
            StreamEvent::Chunk {
                text: "They ".into()
            },
            StreamEvent::Chunk {
                text: "dance".into()
            },
            StreamEvent::Chunk { text: ".".into() },
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn cancelled_stream_ends_with_error_event() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let generator = MockGenerator::streaming(&["a", "b", "c", "d", "e", "f"]).with_delay(50);
    let (orchestrator, _knowledge) = open(&config, MockEmbedder::default(), generator).await;

    let session = orchestrator
        .prepare_stream(&ChatRequest::new("letters", BEDROCK))
        .await
        .unwrap();
    let cancel = CancellationToken::new();
    let (mut rx, handle) = session.spawn(cancel.clone(), 8);

    assert!(matches!(
        rx.recv().await,
        Some(StreamEvent::Context { .. })
    ));
    assert!(matches!(rx.recv().await, Some(StreamEvent::Chunk { .. })));
    cancel.cancel();

    let mut last = None;
    while let Some(event) = rx.recv().await {
        last = Some(event);
    }
    assert!(matches!(last, Some(StreamEvent::Error { .. })));
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(outcome, StreamOutcome::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_uploads_and_questions() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let (orchestrator, knowledge) =
        open(&config, MockEmbedder::default(), MockGenerator::default()).await;
    let orchestrator = Arc::new(orchestrator);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let knowledge = Arc::clone(&knowledge);
        tasks.push(tokio::spawn(async move {
            let text = format!("note {i}: {BEES}");
            knowledge
                .upload(&format!("note-{i}.txt"), text.into_bytes())
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
        let orchestrator = Arc::clone(&orchestrator);
        tasks.push(tokio::spawn(async move {
            orchestrator
                .chat(&ChatRequest::new("where are the flowers", BEDROCK))
                .await
                .map(|_| ())
                .map_err(|e| e.to_string())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(knowledge.list().unwrap().len(), 8);
    let fragments = orchestrator.index().len();
    assert_eq!(fragments, 8);

    let reopened = VectorIndex::open(&config.storage.vector_store_path)
        .await
        .unwrap();
    assert_eq!(reopened.len(), fragments);
}

#[tokio::test]
async fn saved_settings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    {
        let settings = SettingsStore::open(&config.storage.vector_store_path, None)
            .await
            .unwrap();
        settings
            .save_api_keys(ApiKeysUpdate {
                openrouter: Some("sk-or-saved".into()),
                bedrock: None,
            })
            .await
            .unwrap();
        settings
            .save_prompt(PromptTemplate::new("Terse", "Answer in one line.").as_default())
            .await
            .unwrap();
    }

    let generator = MockGenerator::default();
    let (orchestrator, _kb) = open(&config, MockEmbedder::default(), generator.clone()).await;
    assert!(orchestrator.credentials().is_configured(OPENROUTER));
    orchestrator
        .chat(&ChatRequest::new("anything", OPENROUTER))
        .await
        .unwrap();

    orchestrator
        .chat(&ChatRequest::new("anything", BEDROCK))
        .await
        .unwrap();
    assert_eq!(
        generator.last_system_prompt().as_deref(),
        Some("Answer in one line.")
    );
}

#[tokio::test]
async fn embedder_with_wrong_length_is_rejected_on_both_paths() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.embedding.dimensions = 384;
    let (orchestrator, knowledge) =
        open(&config, MockEmbedder::default(), MockGenerator::default()).await;

    let err = knowledge.upload("bees.txt", BEES.as_bytes().to_vec()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    let err = orchestrator
        .chat(&ChatRequest::new("where are the flowers?", BEDROCK))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert!(knowledge.index().is_empty());
}
