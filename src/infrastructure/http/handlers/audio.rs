//! Audio Handler - 提供临时音频

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use std::sync::Arc;

use crate::application::GetAudioQuery;
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// GET /audio/{id}.{ext}
pub async fn get_audio(
    State(state): State<Arc<AppState>>,
    Path(audio_ref): Path<String>,
) -> Result<Response, ApiError> {
    let result = state
        .get_audio_handler
        .handle(GetAudioQuery { audio_ref })?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.content_type)
        .header(header::CONTENT_LENGTH, result.audio_data.len())
        .header(header::CACHE_CONTROL, "no-store")
        .body(Body::from(result.audio_data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
