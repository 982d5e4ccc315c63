use axum::extract::{Multipart, Path, Query, State};
use axum::response::Json;
use log::info;
use std::sync::Arc;
use uuid::Uuid;

use super::types::{
    GenerateAudioRequest, GenerateAudioResponse, LectureDetail, LecturesResponse, UploadResponse,
};
use super::AppState;
use crate::error::{ServiceError, ServiceResult};
use crate::store::Page;

/// POST /api/lectures — multipart upload of one lecture PDF.
///
/// Extraction and row persistence happen before the response; embedding is
/// scheduled in the background, so Q&A becomes available shortly after.
pub async fn upload_lecture(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ServiceResult<Json<UploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut language: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(format!("invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::Validation(format!("failed to read file: {}", e)))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "title" => title = Some(read_text_field(field).await?),
            "description" => description = Some(read_text_field(field).await?),
            "language" => language = Some(read_text_field(field).await?),
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ServiceError::Validation("missing 'file' field".into()))?;
    let title = title.ok_or_else(|| ServiceError::Validation("missing 'title' field".into()))?;
    let language = crate::language::resolve_language(
        &state.config.languages,
        language.as_deref(),
        "",
    );

    let report = state
        .ingest
        .ingest_upload(&file_name, bytes, title, description, &language)
        .await?;

    info!(
        "Uploaded lecture {} ({} pages)",
        report.lecture.id, report.lecture.total_pages
    );

    let pages: Vec<Page> = report.pages.clone();
    tokio::spawn(
        state
            .ingest
            .clone()
            .embed_lecture_background(report.lecture.id, pages),
    );

    Ok(Json(UploadResponse {
        page_count: report.pages.len(),
        lecture: report.lecture,
        issues: report.issues,
    }))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> ServiceResult<String> {
    field
        .text()
        .await
        .map_err(|e| ServiceError::Validation(format!("invalid form field: {}", e)))
}

/// GET /api/lectures
pub async fn list_lectures(
    State(state): State<Arc<AppState>>,
) -> ServiceResult<Json<LecturesResponse>> {
    let data = state.store.list_lectures().await?;
    Ok(Json(LecturesResponse { data }))
}

/// GET /api/lectures/{id}
pub async fn get_lecture(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<LectureDetail>> {
    let lecture = state
        .store
        .get_lecture(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("lecture {}", id)))?;
    let pages = state.store.lecture_pages(id).await?;

    Ok(Json(LectureDetail { lecture, pages }))
}

/// GET /api/lectures/{id}/pages/{page_number}
pub async fn get_page(
    State(state): State<Arc<AppState>>,
    Path((id, page_number)): Path<(Uuid, i32)>,
) -> ServiceResult<Json<Page>> {
    let page = state
        .store
        .get_page(id, page_number)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("page {} of lecture {}", page_number, id))
        })?;

    Ok(Json(page))
}

/// DELETE /api/lectures/{id}
pub async fn delete_lecture(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ServiceResult<Json<serde_json::Value>> {
    state.ingest.delete_lecture(id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

/// POST /api/lectures/{id}/audio — schedule spoken-lecture generation for
/// every page. Returns immediately; pages gain their `audio_url` as
/// generation completes.
pub async fn generate_audio(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(request): Query<GenerateAudioRequest>,
) -> ServiceResult<Json<GenerateAudioResponse>> {
    let lecture = state
        .store
        .get_lecture(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("lecture {}", id)))?;

    let language = crate::language::resolve_language(
        &state.config.languages,
        request.language.as_deref(),
        "",
    );

    let page_count = lecture.total_pages.max(0) as usize;
    tokio::spawn(
        state
            .scripts
            .clone()
            .generate_lecture_audio_background(lecture.clone(), language),
    );

    Ok(Json(GenerateAudioResponse {
        lecture_id: lecture.id,
        status: "processing",
        page_count,
    }))
}
