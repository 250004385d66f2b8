//! Chat Handler - 文本 → 语音中继

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::HeaderMap,
    Json,
};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::RelayChatCommand;
use crate::infrastructure::http::dto::{ChatRequest, ChatResponse};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

/// 客户端标识：X-Forwarded-For 第一项，其次是连接对端地址
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let Json(req) = payload?;

    let cmd = RelayChatCommand {
        text: req.text,
        client_id: client_identity(&headers, connect_info.map(|ConnectInfo(addr)| addr)),
    };

    let result = state.relay_handler.handle(cmd).await?;

    Ok(Json(ChatResponse::from(result)))
}
