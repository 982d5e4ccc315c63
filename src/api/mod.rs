//! HTTP layer: request validation, orchestration of the services, and
//! mapping of service errors to status codes. No business logic lives here.

pub mod chat;
pub mod lectures;
pub mod types;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::config::AppConfig;
use crate::ingest::IngestService;
use crate::rag::RagEngine;
use crate::script::ScriptService;
use crate::speech::SpeechService;
use crate::storage::Storage;
use crate::store::LectureStore;

/// Uploads are bounded well above typical lecture deck sizes
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared, immutable application state handed to every handler
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: LectureStore,
    pub storage: Storage,
    pub ingest: Arc<IngestService>,
    pub rag: Arc<RagEngine>,
    pub scripts: Arc<ScriptService>,
    pub speech: Arc<SpeechService>,
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Result<Router> {
    let cors = build_cors(&state.config.cors_origins)?;
    let files = ServeDir::new(state.storage.root().clone());

    let router = Router::new()
        .route("/health", get(health))
        .route(
            "/api/lectures",
            get(lectures::list_lectures).post(lectures::upload_lecture),
        )
        .route(
            "/api/lectures/{id}",
            get(lectures::get_lecture).delete(lectures::delete_lecture),
        )
        .route(
            "/api/lectures/{id}/pages/{page_number}",
            get(lectures::get_page),
        )
        .route("/api/lectures/{id}/audio", post(lectures::generate_audio))
        .route("/api/chat", post(chat::chat))
        .route("/api/chat/audio", post(chat::chat_audio))
        .nest_service("/files", files)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state);

    Ok(router)
}

fn build_cors(origins: &[String]) -> Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let parsed = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("invalid CORS origin: {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(layer.allow_origin(parsed))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
