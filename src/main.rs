//! ragline: ingest text documents and ask questions answered from them.

mod init;

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use ragline_core::{
    ChatRequest, Config, KnowledgeBase, Orchestrator, SettingsStore, StreamEvent, StreamOutcome,
};
use ragline_gateway::{AppState, GatewayServer};
use ragline_llm::GenerationProviderKind;
use ragline_memory::VectorIndex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "ragline")]
#[command(about = "Retrieval-augmented question answering over your documents", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to $RAGLINE_CONFIG, then config/default.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override `server.host`
        #[arg(long)]
        host: Option<String>,
        /// Override `server.port`
        #[arg(long)]
        port: Option<u16>,
    },
    /// Ingest `.txt` or `.md` files
    Ingest {
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,
    },
    /// Ask a question against the ingested documents
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
        /// Generation backend: openrouter or bedrock
        #[arg(long, short = 'p', default_value = "bedrock")]
        provider: GenerationProviderKind,
        /// Model override for this question
        #[arg(long, short = 'm')]
        model: Option<String>,
        #[arg(long)]
        system_prompt: Option<String>,
        /// Print the answer as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// List or delete ingested documents
    Documents {
        #[command(subcommand)]
        command: DocumentsCommand,
    },
    /// Write a config file with every default spelled out
    Init {
        /// Output path (defaults to the resolved config path)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum DocumentsCommand {
    /// List documents, oldest first
    List,
    /// Delete a document, its fragments and its stored file
    Delete {
        #[arg(value_name = "ID")]
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_subscriber();
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config.as_deref());

    match cli.command {
        Command::Init { output, force } => init::run(&output.unwrap_or(config_path), force),
        Command::Serve { host, port } => {
            let mut config = load_config(&config_path)?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await
        }
        Command::Ingest { paths } => ingest(&load_config(&config_path)?, &paths).await,
        Command::Ask {
            question,
            provider,
            model,
            system_prompt,
            stream,
        } => {
            let mut request = ChatRequest::new(question, provider);
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(prompt) = system_prompt {
                request = request.with_system_prompt(prompt);
            }
            ask(&load_config(&config_path)?, &request, stream).await
        }
        Command::Documents { command } => documents(&load_config(&config_path)?, command).await,
    }
}

fn load_config(path: &Path) -> anyhow::Result<Config> {
    let config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn init_subscriber() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct Services {
    orchestrator: Orchestrator,
    knowledge: KnowledgeBase,
    settings: Arc<SettingsStore>,
}

async fn open_services(config: &Config) -> anyhow::Result<Services> {
    let store = &config.storage.vector_store_path;
    let index = Arc::new(
        VectorIndex::open(store)
            .await
            .with_context(|| format!("failed to open vector index at {}", store.display()))?,
    );
    let settings = Arc::new(
        SettingsStore::open(store, config.secrets.settings_key.as_ref())
            .await
            .context("failed to open settings store")?,
    );
    settings
        .seed_models(config)
        .await
        .context("failed to seed model catalog")?;

    let orchestrator = Orchestrator::from_config(config, Arc::clone(&index), &settings);
    let knowledge = KnowledgeBase::open(config, index, orchestrator.embedding())
        .await
        .context("failed to open knowledge base")?;

    tracing::info!(
        documents = knowledge.registry().len(),
        fragments = knowledge.index().len(),
        embedder = config.embedding.provider.as_str(),
        "knowledge base ready"
    );
    Ok(Services {
        orchestrator,
        knowledge,
        settings,
    })
}

/// Log backends that will fail requests; none of this stops the server.
async fn check_backends(services: &Services, config: &Config) {
    if let Err(e) = services.orchestrator.embedding().health_check().await {
        tracing::warn!(
            provider = %config.embedding.provider,
            "embedding backend unreachable: {e}"
        );
    }
    let credentials = services.orchestrator.credentials();
    for provider in GenerationProviderKind::ALL {
        if !credentials.is_configured(provider) {
            tracing::warn!(
                %provider,
                "no API key configured, chat requests for this provider return 401 until one is saved"
            );
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let services = open_services(config).await?;
    check_backends(&services, config).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let state = AppState::new(
        Arc::new(services.orchestrator),
        Arc::new(services.knowledge),
        services.settings,
    );
    GatewayServer::new(&config.server.host, config.server.port, state, shutdown_rx)
        .with_max_upload_bytes(config.server.max_upload_bytes)
        .serve()
        .await?;
    Ok(())
}

async fn ingest(config: &Config, paths: &[PathBuf]) -> anyhow::Result<()> {
    let services = open_services(config).await?;
    let mut failed = 0usize;
    for path in paths {
        match services.knowledge.ingest_path(path).await {
            Ok(uploaded) => println!(
                "{}  {} ({} chunks)",
                uploaded.document_id, uploaded.file_name, uploaded.chunk_count
            ),
            Err(e) => {
                failed += 1;
                eprintln!("{}: {e}", path.display());
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} files failed to ingest", paths.len());
    }
    Ok(())
}

async fn ask(config: &Config, request: &ChatRequest, stream: bool) -> anyhow::Result<()> {
    let services = open_services(config).await?;
    if !stream {
        let response = services.orchestrator.chat(request).await?;
        println!("{}", response.message);
        tracing::debug!(
            context = response.context.len(),
            total_tokens = response.token_metrics.total_tokens,
            "answer complete"
        );
        return Ok(());
    }

    let session = services.orchestrator.prepare_stream(request).await?;
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    let (mut events, handle) = session.spawn(cancel, 32);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.recv().await {
        match event {
            StreamEvent::Context { context } => {
                tracing::debug!(fragments = context.len(), "context retrieved");
            }
            StreamEvent::Chunk { text } => {
                write!(stdout, "{text}")?;
                stdout.flush()?;
            }
            StreamEvent::Done => writeln!(stdout)?,
            StreamEvent::Error { error } => {
                writeln!(stdout)?;
                bail!("generation failed: {error}");
            }
        }
    }

    match handle.await.context("stream task panicked")? {
        StreamOutcome::Completed { .. } => Ok(()),
        StreamOutcome::Failed(e) => bail!("generation failed: {e}"),
        StreamOutcome::Cancelled => bail!("interrupted"),
        StreamOutcome::Disconnected => bail!("stream closed early"),
    }
}

async fn documents(config: &Config, command: DocumentsCommand) -> anyhow::Result<()> {
    let services = open_services(config).await?;
    match command {
        DocumentsCommand::List => {
            let records = services.knowledge.list()?;
            if records.is_empty() {
                println!("no documents");
            }
            for record in records {
                println!(
                    "{}  {}  {} chunks  {}",
                    record.id,
                    record.file_name,
                    record.chunk_count,
                    record.created_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        DocumentsCommand::Delete { id } => {
            let record = services.knowledge.delete(&id).await?;
            println!("deleted {} ({})", record.id, record.file_name);
        }
    }
    Ok(())
}
