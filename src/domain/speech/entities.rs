//! Speech Context - Entities

use super::PcmSpec;

/// 上游响应载荷
///
/// 同一上游在不同模型 / 配置下返回的形态不同，由字段是否存在决定
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamPayload {
    /// 原始 PCM 样本，需要转码后才能交付
    Pcm { bytes: Vec<u8>, spec: PcmSpec },
    /// 已编码的容器（如 audio/ogg），原样交付
    Encoded { bytes: Vec<u8>, mime_type: String },
    /// 仅有文本，没有音频
    TextOnly { text: String },
}

impl UpstreamPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Pcm { .. } => "pcm",
            Self::Encoded { .. } => "encoded",
            Self::TextOnly { .. } => "text_only",
        }
    }

    pub fn has_audio(&self) -> bool {
        !matches!(self, Self::TextOnly { .. })
    }
}

/// 生成结果
///
/// 每个请求创建一次，生命周期不超过响应 / 缓存
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationResult {
    pub payload: UpstreamPayload,
    /// 同时返回的文本（AUDIO + TEXT 模式）
    pub generated_text: Option<String>,
}

impl GenerationResult {
    pub fn new(payload: UpstreamPayload) -> Self {
        let generated_text = match &payload {
            UpstreamPayload::TextOnly { text } => Some(text.clone()),
            _ => None,
        };
        Self {
            payload,
            generated_text,
        }
    }

    pub fn with_text(mut self, text: Option<String>) -> Self {
        if text.is_some() {
            self.generated_text = text;
        }
        self
    }

    /// 原始音频字节（纯文本响应时为 None）
    pub fn raw_audio(&self) -> Option<&[u8]> {
        match &self.payload {
            UpstreamPayload::Pcm { bytes, .. } | UpstreamPayload::Encoded { bytes, .. } => {
                Some(bytes)
            }
            UpstreamPayload::TextOnly { .. } => None,
        }
    }

    /// 上游声明的 MIME 类型
    pub fn mime_type(&self) -> &str {
        match &self.payload {
            UpstreamPayload::Pcm { .. } => "audio/L16",
            UpstreamPayload::Encoded { mime_type, .. } => mime_type,
            UpstreamPayload::TextOnly { .. } => "text/plain",
        }
    }
}
