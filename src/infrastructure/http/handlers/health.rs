//! Health Handler

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::infrastructure::http::dto::HealthResponse;
use crate::infrastructure::http::state::AppState;

/// Health endpoint - 始终返回 200
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let settings = state.relay_handler.settings();

    Json(HealthResponse {
        status: "ok",
        service: "Gemini Audio Relay",
        format: settings.transcode.format.mime_type(),
        version: env!("CARGO_PKG_VERSION"),
        generator: state.generator_name,
        sheets_logging: state.conversation_log.is_enabled(),
        fallback_audio: settings.fallback_audio.is_some(),
        cached_audio: state.audio_store.stats().total_entries,
    })
}
