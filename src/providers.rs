use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ServiceResult;

/// One turn of a chat conversation, in wire format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Embedding computation, delegated to a hosted model.
///
/// Implementations must return exactly one vector per input text, in input
/// order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> ServiceResult<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::ServiceError::Upstream("empty embedding response".into()))
    }
}

/// Text generation, delegated to a hosted chat model
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> ServiceResult<String>;
}

/// Speech-to-text over raw audio bytes
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>, language: Option<&str>) -> ServiceResult<String>;
}

/// Text-to-speech producing encoded audio (MP3)
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    /// Maximum input length (characters) a single synthesis call accepts
    fn max_input_chars(&self) -> usize;

    async fn synthesize(&self, text: &str, voice: &str) -> ServiceResult<Vec<u8>>;
}
