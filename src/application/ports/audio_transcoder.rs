//! Audio Transcoder Port - 音频转码抽象
//!
//! 定义音频转码的抽象接口，将原始 PCM 封装为容器格式（OGG/Opus、MP3、WAV）

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::PcmSpec;

/// 转码错误
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// 音频输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// Opus 编码的 OGG 容器 - WhatsApp 语音消息要求的格式
    #[default]
    #[serde(alias = "ogg")]
    Opus,
    /// MP3 格式 - 通用兼容
    Mp3,
    /// WAV 格式，不压缩
    Wav,
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Opus => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
        }
    }

    /// 文件扩展名（用于音频 URL）
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Opus => "ogg",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Wav => "wav",
        }
    }

    /// 根据 MIME 类型推断格式
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "audio/ogg" | "audio/opus" => Some(AudioFormat::Opus),
            "audio/mpeg" | "audio/mp3" => Some(AudioFormat::Mp3),
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(AudioFormat::Wav),
            _ => None,
        }
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioFormat::Opus => write!(f, "opus"),
            AudioFormat::Mp3 => write!(f, "mp3"),
            AudioFormat::Wav => write!(f, "wav"),
        }
    }
}

impl std::str::FromStr for AudioFormat {
    type Err = TranscodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "opus" | "ogg" => Ok(AudioFormat::Opus),
            "mp3" => Ok(AudioFormat::Mp3),
            "wav" => Ok(AudioFormat::Wav),
            _ => Err(TranscodeError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// 转码配置
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// 输出格式
    pub format: AudioFormat,
    /// 目标比特率（bps），用于有损压缩格式
    /// Opus 推荐: 16000-64000 用于语音
    pub bitrate: u32,
    /// 声道数
    /// 如果为 None，则保持原始声道数
    pub channels: Option<u8>,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::Opus,
            bitrate: 32000, // 32kbps，语音足够
            channels: Some(1),
        }
    }
}

/// 转码结果
#[derive(Debug, Clone)]
pub struct TranscodeResult {
    /// 转码后的音频数据
    pub audio_data: Vec<u8>,
    /// 输出格式
    pub format: AudioFormat,
    /// 时长（毫秒）
    pub duration_ms: u64,
    /// 输出采样率
    pub sample_rate: u32,
    /// 输出声道数
    pub channels: u8,
    /// 原始大小（字节）
    pub original_size: usize,
    /// 转码后大小（字节）
    pub transcoded_size: usize,
}

/// Audio Transcoder Port
///
/// 纯函数式转码：不访问网络，也不持有状态
pub trait AudioTranscoderPort: Send + Sync {
    /// 将原始 PCM 封装为目标容器
    ///
    /// # Arguments
    /// * `pcm` - 交错排列的小端 PCM 样本
    /// * `spec` - 样本宽度、采样率、声道数
    /// * `config` - 转码配置
    fn pcm_to_container(
        &self,
        pcm: &[u8],
        spec: PcmSpec,
        config: &TranscodeConfig,
    ) -> Result<TranscodeResult, TranscodeError>;

    /// 检查是否支持指定格式
    fn supports_format(&self, format: AudioFormat) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("ogg".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert_eq!("OPUS".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert_eq!("mp3".parse::<AudioFormat>().unwrap(), AudioFormat::Mp3);
        assert!("flac".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_from_mime_ignores_parameters() {
        assert_eq!(
            AudioFormat::from_mime("audio/ogg; codecs=opus"),
            Some(AudioFormat::Opus)
        );
        assert_eq!(AudioFormat::from_mime("audio/mpeg"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_mime("audio/L16;rate=24000"), None);
    }

    #[test]
    fn test_mime_and_extension() {
        assert_eq!(AudioFormat::Opus.mime_type(), "audio/ogg");
        assert_eq!(AudioFormat::Opus.extension(), "ogg");
        assert_eq!(AudioFormat::Wav.mime_type(), "audio/wav");
    }
}
