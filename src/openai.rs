use async_trait::async_trait;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::OpenAiConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::providers::{ChatMessage, ChatProvider, EmbeddingProvider, SpeechToText, TextToSpeech};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Input ceiling of the speech synthesis endpoint, in characters
const TTS_MAX_INPUT_CHARS: usize = 4096;

/// Client for an OpenAI-compatible API: chat, embeddings, TTS and STT
#[derive(Clone)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client with bearer auth baked into default headers
    pub fn new(config: OpenAiConfig) -> ServiceResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| ServiceError::Validation("invalid OpenAI API key".into()))?,
        );

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| ServiceError::Upstream(format!("failed to build HTTP client: {}", e)))?;

        Ok(OpenAiClient { config, client })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Send a request, retrying retryable failures with exponential backoff.
    /// The request is rebuilt per attempt so multipart bodies can be resent.
    async fn execute_with_retry(
        &self,
        operation: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> ServiceResult<reqwest::Response> {
        let mut attempt = 0usize;

        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    let retryable = status == StatusCode::TOO_MANY_REQUESTS
                        || status.is_server_error();
                    if retryable && attempt + 1 < self.config.max_retries {
                        attempt += 1;
                        warn!(
                            "{} returned {}, retrying ({}/{})",
                            operation, status, attempt, self.config.max_retries
                        );
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    return Err(ServiceError::Upstream(format!(
                        "{} failed ({}): {}",
                        operation, status, body
                    )));
                }
                Err(e) => {
                    let retryable = e.is_timeout() || e.is_connect();
                    if retryable && attempt + 1 < self.config.max_retries {
                        attempt += 1;
                        warn!(
                            "{} errored ({}), retrying ({}/{})",
                            operation, e, attempt, self.config.max_retries
                        );
                        tokio::time::sleep(retry_backoff(attempt)).await;
                        continue;
                    }
                    return Err(ServiceError::Upstream(format!("{} failed: {}", operation, e)));
                }
            }
        }
    }
}

fn retry_backoff(attempt: usize) -> Duration {
    Duration::from_millis(500u64.saturating_mul(1 << attempt.min(6)))
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    /// Embed texts, splitting into bounded sub-batches per request.
    /// Verifies the API returned one vector per input.
    async fn embed_batch(&self, texts: &[String]) -> ServiceResult<Vec<Vec<f32>>> {
        #[derive(Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: &'a [String],
        }

        #[derive(Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingEntry>,
        }

        #[derive(Deserialize)]
        struct EmbeddingEntry {
            index: usize,
            embedding: Vec<f32>,
        }

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.endpoint("embeddings");
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.embed_batch_size.max(1)) {
            let response = self
                .execute_with_retry("embeddings request", || {
                    self.client.post(&url).json(&EmbeddingRequest {
                        model: &self.config.embedding_model,
                        input: batch,
                    })
                })
                .await?;

            let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
                ServiceError::Upstream(format!("failed to parse embedding response: {}", e))
            })?;

            if parsed.data.len() != batch.len() {
                return Err(ServiceError::Upstream(format!(
                    "embedding API returned {} vectors for {} inputs",
                    parsed.data.len(),
                    batch.len()
                )));
            }

            parsed.data.sort_by_key(|entry| entry.index);
            vectors.extend(parsed.data.into_iter().map(|entry| entry.embedding));
        }

        Ok(vectors)
    }
}

#[async_trait]
impl ChatProvider for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage], temperature: f32) -> ServiceResult<String> {
        #[derive(Serialize)]
        struct ChatRequest<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }

        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: Option<String>,
        }

        let url = self.endpoint("chat/completions");
        let response = self
            .execute_with_retry("chat completion", || {
                self.client.post(&url).json(&ChatRequest {
                    model: &self.config.chat_model,
                    messages,
                    temperature,
                })
            })
            .await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("failed to parse chat response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ServiceError::Upstream("chat model returned no content".into()))
    }
}

#[async_trait]
impl SpeechToText for OpenAiClient {
    async fn transcribe(&self, audio: Vec<u8>, language: Option<&str>) -> ServiceResult<String> {
        #[derive(Deserialize)]
        struct TranscriptionResponse {
            text: String,
        }

        let url = self.endpoint("audio/transcriptions");
        let language = language.map(|s| s.to_string());

        let response = self
            .execute_with_retry("transcription request", || {
                let part = reqwest::multipart::Part::bytes(audio.clone())
                    .file_name("question.audio")
                    .mime_str("application/octet-stream")
                    .expect("static mime type is valid");
                let mut form = reqwest::multipart::Form::new()
                    .part("file", part)
                    .text("model", self.config.stt_model.clone());
                if let Some(lang) = &language {
                    form = form.text("language", lang.clone());
                }
                self.client.post(&url).multipart(form)
            })
            .await?;

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            ServiceError::Upstream(format!("failed to parse transcription response: {}", e))
        })?;

        Ok(parsed.text)
    }
}

#[async_trait]
impl TextToSpeech for OpenAiClient {
    fn max_input_chars(&self) -> usize {
        TTS_MAX_INPUT_CHARS
    }

    async fn synthesize(&self, text: &str, voice: &str) -> ServiceResult<Vec<u8>> {
        #[derive(Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
        }

        let url = self.endpoint("audio/speech");
        let response = self
            .execute_with_retry("speech synthesis", || {
                self.client.post(&url).json(&SpeechRequest {
                    model: &self.config.tts_model,
                    input: text,
                    voice,
                    response_format: "mp3",
                })
            })
            .await?;

        let bytes = response.bytes().await.map_err(|e| {
            ServiceError::Upstream(format!("failed to read synthesized audio: {}", e))
        })?;

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_saturates() {
        assert!(retry_backoff(1) < retry_backoff(2));
        assert!(retry_backoff(2) < retry_backoff(4));
        assert_eq!(retry_backoff(6), retry_backoff(20));
    }
}
