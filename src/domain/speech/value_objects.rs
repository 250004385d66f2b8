//! Speech Context - Value Objects

use serde::{Deserialize, Serialize};

use super::SpeechError;

/// 单次请求允许的最大字符数
pub const MAX_TEXT_CHARS: usize = 5000;

/// 生成请求
///
/// 不变量:
/// - text 已 trim
/// - text 非空
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    text: String,
}

impl GenerationRequest {
    pub fn new(text: impl AsRef<str>) -> Result<Self, SpeechError> {
        let text = text.as_ref().trim();
        if text.is_empty() {
            return Err(SpeechError::EmptyText);
        }
        let len = text.chars().count();
        if len > MAX_TEXT_CHARS {
            return Err(SpeechError::TextTooLong {
                len,
                max: MAX_TEXT_CHARS,
            });
        }
        Ok(Self {
            text: text.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// 原始 PCM 参数
///
/// 样本为小端有符号整数（8 位为无符号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcmSpec {
    /// 每个样本的字节数（1-4）
    pub sample_width: u16,
    /// 采样率（Hz）
    pub sample_rate: u32,
    /// 声道数
    pub channels: u16,
}

impl PcmSpec {
    /// Gemini TTS 的默认输出：16 位、单声道
    pub fn s16_mono(sample_rate: u32) -> Self {
        Self {
            sample_width: 2,
            sample_rate,
            channels: 1,
        }
    }

    pub fn validate(&self) -> Result<(), SpeechError> {
        if !(1..=4).contains(&self.sample_width) {
            return Err(SpeechError::InvalidPcmSpec(format!(
                "unsupported sample width: {}",
                self.sample_width
            )));
        }
        if self.sample_rate == 0 {
            return Err(SpeechError::InvalidPcmSpec("sample rate cannot be 0".to_string()));
        }
        if self.channels == 0 {
            return Err(SpeechError::InvalidPcmSpec("channels cannot be 0".to_string()));
        }
        Ok(())
    }

    /// 每帧字节数（所有声道的一个采样点）
    pub fn frame_bytes(&self) -> usize {
        self.sample_width as usize * self.channels as usize
    }

    /// 给定字节数对应的时长（毫秒）
    pub fn duration_ms(&self, byte_len: usize) -> u64 {
        let frame_bytes = self.frame_bytes();
        if frame_bytes == 0 || self.sample_rate == 0 {
            return 0;
        }
        (byte_len / frame_bytes) as u64 * 1000 / self.sample_rate as u64
    }
}
