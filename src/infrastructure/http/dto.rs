//! Data Transfer Objects

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::application::RelayChatResponse;

// ============================================================================
// Chat DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    /// 缺失时按空文本处理，由校验返回 400
    #[serde(default)]
    pub text: String,
}

/// /chat 响应
///
/// 扁平字段之外保留 `candidates` 结构，兼容按 Gemini 响应格式解析的客户端
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub text_response: Option<String>,
    pub audio_base64: Option<String>,
    pub audio_url: Option<String>,
    pub audio_id: Option<String>,
    pub mime_type: Option<String>,
    pub duration_ms: Option<u64>,
    pub fallback: bool,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Serialize)]
pub struct Candidate {
    pub content: CandidateContent,
}

#[derive(Debug, Serialize)]
pub struct CandidateContent {
    pub role: &'static str,
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl From<RelayChatResponse> for ChatResponse {
    fn from(response: RelayChatResponse) -> Self {
        let mut parts = Vec::new();
        if let Some(text) = &response.generated_text {
            parts.push(Part {
                text: Some(text.clone()),
                inline_data: None,
            });
        }

        let (audio_base64, audio_url, audio_id, mime_type, duration_ms) = match response.audio {
            Some(audio) => {
                let data = base64::engine::general_purpose::STANDARD.encode(&audio.bytes);
                parts.push(Part {
                    text: None,
                    inline_data: Some(InlineData {
                        mime_type: audio.mime_type.clone(),
                        data: data.clone(),
                    }),
                });
                (
                    Some(data),
                    Some(audio.url),
                    Some(audio.id),
                    Some(audio.mime_type),
                    audio.duration_ms,
                )
            }
            None => (None, None, None, None, None),
        };

        Self {
            text_response: response.generated_text,
            audio_base64,
            audio_url,
            audio_id,
            mime_type,
            duration_ms,
            fallback: response.fallback,
            candidates: vec![Candidate {
                content: CandidateContent {
                    role: "model",
                    parts,
                },
            }],
        }
    }
}

// ============================================================================
// Health DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    /// 输出音频的 MIME 类型
    pub format: &'static str,
    pub version: &'static str,
    pub generator: &'static str,
    pub sheets_logging: bool,
    pub fallback_audio: bool,
    pub cached_audio: usize,
}
