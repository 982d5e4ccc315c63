use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Error kinds surfaced by the service layer.
///
/// Each variant maps to a stable HTTP status so handlers stay free of
/// error-translation logic. `RetrievalMiss` is deliberately separate from
/// `Upstream`: a lecture that was never embedded is a client-visible state,
/// not a service outage.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("document extraction failed: {0}")]
    Extraction(String),

    #[error("audio not usable: {0}")]
    UnusableAudio(String),

    #[error("no indexed content: {0}")]
    RetrievalMiss(String),

    #[error("upstream service error: {0}")]
    Upstream(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::UnusableAudio(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::RetrievalMiss(_) => StatusCode::CONFLICT,
            ServiceError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::VectorStore(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable error code for API clients
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation_error",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Extraction(_) => "extraction_error",
            ServiceError::UnusableAudio(_) => "unusable_audio",
            ServiceError::RetrievalMiss(_) => "retrieval_miss",
            ServiceError::Upstream(_) => "upstream_error",
            ServiceError::VectorStore(_) => "vector_store_error",
            ServiceError::Persistence(_) => "persistence_error",
            ServiceError::Storage(_) => "storage_error",
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_miss_is_distinct_from_upstream_failure() {
        let miss = ServiceError::RetrievalMiss("lecture not embedded".into());
        let outage = ServiceError::Upstream("embedding API 500".into());

        assert_eq!(miss.status(), StatusCode::CONFLICT);
        assert_eq!(outage.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_ne!(miss.kind(), outage.kind());
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(
            ServiceError::Validation("bad title".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("lecture".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::UnusableAudio("too short".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
