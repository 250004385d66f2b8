//! Speech Generator Port - 上游语音生成抽象
//!
//! 定义文本 → 音频（或文本）生成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{GenerationRequest, GenerationResult};

/// 上游错误类别
///
/// 重试判断只看类别，不再匹配错误消息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    /// 配额 / 限流（HTTP 429, RESOURCE_EXHAUSTED）
    RateLimited,
    /// 服务暂时不可用（HTTP 503, UNAVAILABLE）
    Unavailable,
    /// 请求超时
    Timeout,
    /// 请求被拒绝（其他 4xx，如密钥无效、参数错误）
    Rejected,
    /// 网络错误
    Network,
    /// 响应无法解析或不含任何可用内容
    InvalidResponse,
}

impl UpstreamErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Network => "network",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

/// 上游生成错误
#[derive(Debug, Clone, Error)]
#[error("{}: {message}", kind.as_str())]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::RateLimited, message)
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::InvalidResponse, message)
    }

    /// 根据 HTTP 状态码与上游 status 字段分类
    ///
    /// `upstream_status` 为 Google API 错误体中的 `error.status`（如 RESOURCE_EXHAUSTED）
    pub fn from_status(status: u16, upstream_status: Option<&str>, message: impl Into<String>) -> Self {
        let kind = match (status, upstream_status) {
            (429, _) | (_, Some("RESOURCE_EXHAUSTED")) => UpstreamErrorKind::RateLimited,
            (503, _) | (_, Some("UNAVAILABLE")) => UpstreamErrorKind::Unavailable,
            (504, _) | (_, Some("DEADLINE_EXCEEDED")) => UpstreamErrorKind::Timeout,
            (400..=499, _) => UpstreamErrorKind::Rejected,
            _ => UpstreamErrorKind::Network,
        };
        Self::new(kind, message)
    }

    /// 无法按错误类型分类的传输层错误才退回到消息匹配
    ///
    /// 调用方需先去掉消息中的 URL，路径里的 generateContent 会命中 "rate"
    pub fn from_transport(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if looks_rate_limited(&message) {
            UpstreamErrorKind::RateLimited
        } else {
            UpstreamErrorKind::Network
        };
        Self::new(kind, message)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == UpstreamErrorKind::RateLimited
    }
}

/// 错误消息是否像是限流 / 配额错误
pub fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["rate", "quota", "429", "too many"]
        .iter()
        .any(|marker| lower.contains(marker))
}

/// Speech Generator Port
///
/// 外部生成服务的抽象接口
#[async_trait]
pub trait SpeechGeneratorPort: Send + Sync {
    /// 生成音频（或文本）
    ///
    /// 返回值的形态（PCM / 已编码容器 / 纯文本）由上游响应决定
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, UpstreamError>;

    /// 实现名称（用于日志和 health 输出）
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(
            UpstreamError::from_status(429, None, "x").kind,
            UpstreamErrorKind::RateLimited
        );
        assert_eq!(
            UpstreamError::from_status(400, Some("RESOURCE_EXHAUSTED"), "x").kind,
            UpstreamErrorKind::RateLimited
        );
        assert_eq!(
            UpstreamError::from_status(503, None, "x").kind,
            UpstreamErrorKind::Unavailable
        );
        assert_eq!(
            UpstreamError::from_status(403, Some("PERMISSION_DENIED"), "x").kind,
            UpstreamErrorKind::Rejected
        );
        assert_eq!(
            UpstreamError::from_status(500, Some("INTERNAL"), "x").kind,
            UpstreamErrorKind::Network
        );
    }

    #[test]
    fn test_transport_fallback_classification() {
        assert!(UpstreamError::from_transport("Too Many Requests").is_rate_limited());
        assert!(UpstreamError::from_transport("Quota exceeded for model").is_rate_limited());
        assert!(!UpstreamError::from_transport("connection reset by peer").is_rate_limited());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = UpstreamError::rate_limited("slow down");
        assert_eq!(err.to_string(), "rate_limited: slow down");
    }
}
