use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

use crate::chunking::{ChunkConfig, ChunkStrategy};

/// Configuration for the Qdrant vector store
#[derive(Clone)]
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
    /// Dimension of the embedding vectors stored in each collection
    pub vector_size: u64,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").context("QDRANT_URL not set")?;
        let api_key = env::var("QDRANT_API_KEY").ok();
        let vector_size = env_parse("EMBEDDING_DIMENSIONS", 1536)?;

        Ok(QdrantConfig {
            url,
            api_key,
            vector_size,
        })
    }
}

/// Configuration for the OpenAI-compatible API (chat, embeddings, speech)
#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub tts_model: String,
    pub stt_model: String,
    /// Upper bound on texts per embeddings request
    pub embed_batch_size: usize,
    /// Bounded retries for retryable upstream failures
    pub max_retries: usize,
}

impl OpenAiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let base_url =
            env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let chat_model = env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let embedding_model = env::var("OPENAI_EMBEDDING_MODEL")
            .unwrap_or_else(|_| "text-embedding-3-small".to_string());
        let tts_model = env::var("OPENAI_TTS_MODEL").unwrap_or_else(|_| "tts-1".to_string());
        let stt_model = env::var("OPENAI_STT_MODEL").unwrap_or_else(|_| "whisper-1".to_string());
        let embed_batch_size = env_parse("EMBED_BATCH_SIZE", 64)?;
        let max_retries = env_parse("MAX_RETRIES", 3)?;

        Ok(OpenAiConfig {
            api_key,
            base_url,
            chat_model,
            embedding_model,
            tts_model,
            stt_model,
            embed_batch_size,
            max_retries,
        })
    }
}

/// Object storage layout: a local root with temp/pdf/audio folders, exposed
/// through the `/files` route.
#[derive(Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    /// Base URL prepended to generated file references
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self> {
        let root = env::var("STORAGE_ROOT").unwrap_or_else(|_| "./storage".to_string());
        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string());

        Ok(StorageConfig {
            root: PathBuf::from(root),
            public_base_url,
        })
    }
}

/// Retrieval parameters for question answering
#[derive(Clone)]
pub struct RagConfig {
    /// Default number of chunks retrieved per query
    pub top_k: u64,
    /// Whether to rewrite queries with the chat model before retrieval
    pub expand_queries: bool,
}

impl RagConfig {
    pub fn from_env() -> Result<Self> {
        let top_k = env_parse("TOP_K_RESULTS", 5)?;
        let expand_queries = env_parse("EXPAND_QUERIES", false)?;

        Ok(RagConfig {
            top_k,
            expand_queries,
        })
    }
}

/// Languages the service answers and speaks in
#[derive(Clone)]
pub struct LanguageConfig {
    pub supported: Vec<String>,
    pub default: String,
}

impl LanguageConfig {
    pub fn from_env() -> Result<Self> {
        let supported = env::var("SUPPORTED_LANGUAGES")
            .unwrap_or_else(|_| "ko,en,ja,zh".to_string())
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();
        let default = env::var("DEFAULT_LANGUAGE").unwrap_or_else(|_| "en".to_string());

        anyhow::ensure!(
            supported.contains(&default),
            "DEFAULT_LANGUAGE {} is not in SUPPORTED_LANGUAGES",
            default
        );

        Ok(LanguageConfig { supported, default })
    }
}

/// Complete application configuration, loaded once at process start and
/// immutable afterwards.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub cors_origins: Vec<String>,
    pub qdrant: QdrantConfig,
    pub openai: OpenAiConfig,
    pub storage: StorageConfig,
    pub rag: RagConfig,
    pub languages: LanguageConfig,
    pub chunking: ChunkConfig,
    /// Path to a tesseract binary used as OCR fallback for image-only pages
    pub tesseract_path: Option<PathBuf>,
}

impl AppConfig {
    /// Assemble the full configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let tesseract_path = env::var("TESSERACT_PATH").ok().map(PathBuf::from);

        Ok(AppConfig {
            database_url,
            cors_origins,
            qdrant: QdrantConfig::from_env()?,
            openai: OpenAiConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            rag: RagConfig::from_env()?,
            languages: LanguageConfig::from_env()?,
            chunking: chunking_from_env()?,
            tesseract_path,
        })
    }
}

fn chunking_from_env() -> Result<ChunkConfig> {
    let strategy: ChunkStrategy = env::var("CHUNK_STRATEGY")
        .unwrap_or_else(|_| "sentence".to_string())
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let target_size = env_parse("CHUNK_SIZE", 1000)?;
    let overlap_ratio = env_parse("CHUNK_OVERLAP_RATIO", 0.2)?;

    Ok(ChunkConfig {
        strategy,
        target_size,
        overlap_ratio,
        ..ChunkConfig::default()
    })
}

/// Parse an environment variable, falling back to a default when unset
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}
