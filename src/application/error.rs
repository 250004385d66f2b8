//! 应用层错误定义
//!
//! 中继流程的统一错误类型，只有这里的错误会影响 HTTP 响应

use std::time::Duration;

use thiserror::Error;

use crate::application::ports::{StoreError, TranscodeError, UpstreamError, UpstreamErrorKind};
use crate::application::retry::RetryError;
use crate::domain::SpeechError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum RelayError {
    /// 客户端输入无效（不重试）
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// 准入被拒绝
    #[error("Rate limited, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// 上游生成失败
    #[error("Upstream error: {source}")]
    Upstream {
        source: UpstreamError,
        /// 瞬时错误且重试已耗尽
        exhausted: bool,
    },

    /// 本地转码失败
    #[error("Transcode error: {0}")]
    Transcode(#[from] TranscodeError),

    /// 音频不存在或已过期
    #[error("{0}")]
    NotFound(String),

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 上游超时（整体请求超时也归为此类）
    pub fn upstream_timeout(limit: Duration) -> Self {
        Self::Upstream {
            source: UpstreamError::new(
                UpstreamErrorKind::Timeout,
                format!("no response within {}s", limit.as_secs()),
            ),
            exhausted: false,
        }
    }

    /// 是否应映射为 429（准入拒绝或上游配额耗尽）
    pub fn is_throttled(&self) -> bool {
        match self {
            RelayError::RateLimited { .. } => true,
            RelayError::Upstream { exhausted, .. } => *exhausted,
            _ => false,
        }
    }
}

impl From<SpeechError> for RelayError {
    fn from(err: SpeechError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl From<StoreError> for RelayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(format!("Audio not found: {}", id)),
        }
    }
}

impl From<RetryError<UpstreamError>> for RelayError {
    fn from(err: RetryError<UpstreamError>) -> Self {
        let exhausted = err.is_exhausted();
        Self::Upstream {
            source: err.into_inner(),
            exhausted,
        }
    }
}
