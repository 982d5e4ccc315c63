use axum::extract::{Multipart, State};
use axum::response::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{AudioChatResponse, ChatRequest, ChatResponse};
use super::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::language::{resolve_language, voice_for_language};

/// POST /api/chat — text question against one lecture
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ServiceResult<Json<ChatResponse>> {
    if state.store.get_lecture(request.lecture_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "lecture {}",
            request.lecture_id
        )));
    }

    let language = resolve_language(
        &state.config.languages,
        request.language.as_deref(),
        &request.question,
    );

    let result = state
        .rag
        .answer(
            &request.lecture_id,
            &request.question,
            &request.history,
            request.top_k,
            &language,
        )
        .await?;

    Ok(Json(ChatResponse {
        answer: result.answer,
        language,
        sources: result.sources,
    }))
}

/// POST /api/chat/audio — spoken question as multipart audio. The reply
/// carries the transcript and, when `speak` is set, the answer synthesized
/// back to audio.
pub async fn chat_audio(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ServiceResult<Json<AudioChatResponse>> {
    let mut lecture_id: Option<Uuid> = None;
    let mut audio: Option<Vec<u8>> = None;
    let mut language: Option<String> = None;
    let mut speak = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "lecture_id" => {
                let raw = field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("invalid lecture_id field: {}", e))
                })?;
                let parsed = raw.trim().parse().map_err(|_| {
                    ServiceError::Validation(format!("lecture_id is not a UUID: {}", raw))
                })?;
                lecture_id = Some(parsed);
            }
            "audio" => {
                let bytes = field.bytes().await.map_err(|e| {
                    ServiceError::Validation(format!("failed to read audio: {}", e))
                })?;
                audio = Some(bytes.to_vec());
            }
            "language" => {
                let raw = field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("invalid language field: {}", e))
                })?;
                language = Some(raw);
            }
            "speak" => {
                let raw = field.text().await.map_err(|e| {
                    ServiceError::Validation(format!("invalid speak field: {}", e))
                })?;
                speak = matches!(raw.trim(), "true" | "1" | "yes");
            }
            _ => {}
        }
    }

    let lecture_id =
        lecture_id.ok_or_else(|| ServiceError::Validation("missing 'lecture_id' field".into()))?;
    let audio = audio.ok_or_else(|| ServiceError::Validation("missing 'audio' field".into()))?;

    if state.store.get_lecture(lecture_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!("lecture {}", lecture_id)));
    }

    let transcript = state
        .speech
        .transcribe_question(audio, language.as_deref())
        .await?;
    let language = resolve_language(&state.config.languages, language.as_deref(), &transcript);

    info!(
        "Voice question for lecture {}: {} chars transcribed",
        lecture_id,
        transcript.chars().count()
    );

    let result = state
        .rag
        .answer(&lecture_id, &transcript, &[], None, &language)
        .await?;

    let answer_audio = if speak {
        let voice = voice_for_language(&language);
        let synthesized = state.speech.synthesize_long(&result.answer, voice).await?;
        Some(BASE64.encode(synthesized))
    } else {
        None
    };

    Ok(Json(AudioChatResponse {
        transcript,
        answer: result.answer,
        language,
        sources: result.sources,
        answer_audio,
    }))
}
