//! Relay Commands - 文本 → 语音中继命令

/// 纯音频响应时写入日志 / 响应的文本占位符
pub const AUDIO_ONLY_PLACEHOLDER: &str = "(audio generado por Gemini)";

/// 中继一次对话请求
#[derive(Debug, Clone)]
pub struct RelayChatCommand {
    /// 原始输入文本（未 trim）
    pub text: String,
    /// 客户端标识（用于限流）
    pub client_id: String,
}

/// 已存储并可访问的音频
#[derive(Debug, Clone)]
pub struct RelayedAudio {
    pub id: String,
    pub url: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    pub duration_ms: Option<u64>,
}

/// 中继响应
#[derive(Debug, Clone)]
pub struct RelayChatResponse {
    /// 上游生成的文本
    pub generated_text: Option<String>,
    /// 音频（纯文本响应时为 None）
    pub audio: Option<RelayedAudio>,
    /// 是否使用了备用音频
    pub fallback: bool,
}
