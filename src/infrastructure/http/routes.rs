//! HTTP Routes
//!
//! API Endpoints:
//! - /chat                 POST  文本 → 语音，返回 base64 与音频 URL
//! - /audio/{id}.{ext}     GET   获取临时音频（也接受不带扩展名的 id）
//! - /health               GET   健康检查

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

/// 创建所有路由
pub fn create_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat", post(handlers::chat))
        .route("/audio/:audio_ref", get(handlers::get_audio))
        .route("/health", get(handlers::health))
}
