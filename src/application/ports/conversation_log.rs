//! Conversation Log Port - 对话日志（电子表格）

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// 日志写入错误
///
/// 永远不会影响主响应，只会被记录
#[derive(Debug, Error)]
pub enum LogError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Service error: {0}")]
    ServiceError(String),
}

/// 一行对话日志
#[derive(Debug, Clone)]
pub struct LogRow {
    pub timestamp: DateTime<Utc>,
    pub input_text: String,
    /// 生成的文本，纯音频响应时为占位符
    pub generated_text: String,
    /// 音频 base64 或音频 URL
    pub audio_ref: String,
}

impl LogRow {
    pub fn into_values(self) -> Vec<String> {
        vec![
            self.timestamp.to_rfc3339(),
            self.input_text,
            self.generated_text,
            self.audio_ref,
        ]
    }
}

/// Conversation Log Port
#[async_trait]
pub trait ConversationLogPort: Send + Sync {
    /// 追加一行日志
    async fn append(&self, row: LogRow) -> Result<(), LogError>;

    /// 是否已启用（用于 health 输出）
    fn is_enabled(&self) -> bool;
}

/// 未配置表格时使用的空实现
pub struct DisabledConversationLog;

#[async_trait]
impl ConversationLogPort for DisabledConversationLog {
    async fn append(&self, _row: LogRow) -> Result<(), LogError> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}
