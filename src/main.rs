use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use log::info;
use std::net::SocketAddr;
use std::sync::Arc;

use lectern::api::{self, AppState};
use lectern::config::AppConfig;
use lectern::database::VectorStore;
use lectern::document::{OcrEngine, TesseractOcr};
use lectern::ingest::IngestService;
use lectern::openai::OpenAiClient;
use lectern::rag::RagEngine;
use lectern::script::ScriptService;
use lectern::speech::SpeechService;
use lectern::storage::Storage;
use lectern::store::LectureStore;

/// Backend serving lecture ingestion, question answering, and spoken
/// lecture generation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Address to bind the HTTP server to
    #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(long, env = "API_PORT", default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    // Load configuration from environment
    let config = Arc::new(AppConfig::from_env().context("Failed to load configuration")?);

    // Infrastructure clients
    let store = LectureStore::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    store
        .init_schema()
        .await
        .context("Failed to initialize database schema")?;

    let storage = Storage::init(&config.storage)
        .await
        .context("Failed to initialize storage directories")?;

    let vectors = Arc::new(
        VectorStore::new(config.qdrant.clone()).context("Failed to initialize vector store")?,
    );

    let openai =
        Arc::new(OpenAiClient::new(config.openai.clone()).context("Failed to build API client")?);

    let ocr = config.tesseract_path.clone().map(|path| {
        Arc::new(TesseractOcr::new(path, storage.temp_dir())) as Arc<dyn OcrEngine>
    });

    // Service wiring: adapters behind their traits, orchestration on top
    let ingest = Arc::new(IngestService::new(
        store.clone(),
        storage.clone(),
        vectors.clone(),
        openai.clone(),
        config.chunking.clone(),
        ocr,
    ));

    let rag = Arc::new(RagEngine::new(
        vectors.clone(),
        openai.clone(),
        openai.clone(),
        &config.rag,
    ));

    let speech = Arc::new(SpeechService::new(openai.clone(), openai.clone()));

    let scripts = Arc::new(ScriptService::new(
        store.clone(),
        storage.clone(),
        openai.clone(),
        speech.clone(),
    ));

    let state = Arc::new(AppState {
        config,
        store,
        storage,
        ingest,
        rag,
        scripts,
        speech,
    });

    let app = api::router(state).context("Failed to build router")?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .context("Invalid bind address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind address")?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
