//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::ports::{AudioFormat, TranscodeConfig};
use crate::application::retry::RetryPolicy;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// Gemini 上游配置
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 上游重试配置
    #[serde(default)]
    pub retry: RetryConfig,

    /// 限流配置
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// 临时音频存储配置
    #[serde(default)]
    pub store: StoreConfig,

    /// 表格日志配置
    #[serde(default)]
    pub sheets: SheetsConfig,

    /// 中继流程配置
    #[serde(default)]
    pub relay: RelayConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（音频 URL 的前缀）
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url
            .clone()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    &self.host
                };
                format!("http://{}:{}", host, self.port)
            })
    }
}

/// Gemini 上游配置
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiConfig {
    /// API 密钥（不会出现在日志中）
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    #[serde(default = "default_gemini_model")]
    pub model: String,

    #[serde(default = "default_voice_name")]
    pub voice_name: String,

    #[serde(default)]
    pub language_code: Option<String>,

    /// 响应模态：AUDIO、TEXT 或两者
    #[serde(default = "default_modalities")]
    pub modalities: Vec<String>,

    /// mime 未声明采样率时假定的 PCM 采样率
    #[serde(default = "default_gemini_sample_rate")]
    pub sample_rate: u32,

    /// HTTP 请求超时时间（秒）
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,

    /// 使用本地静音生成器代替 Gemini
    #[serde(default)]
    pub fake: bool,
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_gemini_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn default_voice_name() -> String {
    "Zephyr".to_string()
}

fn default_modalities() -> Vec<String> {
    vec!["AUDIO".to_string()]
}

fn default_gemini_sample_rate() -> u32 {
    24000
}

fn default_gemini_timeout() -> u64 {
    60
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_gemini_base_url(),
            model: default_gemini_model(),
            voice_name: default_voice_name(),
            language_code: None,
            modalities: default_modalities(),
            sample_rate: default_gemini_sample_rate(),
            timeout_secs: default_gemini_timeout(),
            fake: false,
        }
    }
}

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 输出格式
    /// 可选: opus (ogg), mp3, wav
    #[serde(default)]
    pub output_format: AudioFormat,

    /// 目标比特率（bps），用于有损压缩格式
    /// Opus 推荐: 16000-64000 用于语音
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,

    /// 声道数
    /// 0 表示保持原始声道数，1 表示单声道
    #[serde(default = "default_channels")]
    pub channels: u8,
}

fn default_bitrate() -> u32 {
    32000 // 32kbps，语音足够
}

fn default_channels() -> u8 {
    1 // 单声道
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_format: AudioFormat::Opus,
            bitrate: default_bitrate(),
            channels: default_channels(),
        }
    }
}

impl AudioConfig {
    pub fn transcode_config(&self) -> TranscodeConfig {
        TranscodeConfig {
            format: self.output_format,
            bitrate: self.bitrate,
            channels: (self.channels > 0).then_some(self.channels),
        }
    }
}

/// 重试配置
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// 退避时间表（毫秒），超出长度时重复最后一项
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: Vec<u64>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_ms() -> Vec<u64> {
    vec![500, 1000, 2000]
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.backoff_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
        )
    }
}

/// 限流配置
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// 窗口内允许的最大请求数
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,

    /// 窗口长度（秒）
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_max_requests() -> usize {
    5
}

fn default_window_secs() -> u64 {
    10
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

/// 临时音频存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// 条目存活时间（秒）
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// 最大条目数，超出时淘汰最旧的
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,

    /// 后台清理间隔（秒）
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600 // 1 小时
}

fn default_max_entries() -> usize {
    256
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// 表格日志配置
///
/// spreadsheet_id 与 access_token 都设置时才启用
#[derive(Debug, Clone, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_sheets_range")]
    pub range: String,

    #[serde(default = "default_sheets_base_url")]
    pub base_url: String,
}

fn default_sheets_range() -> String {
    "Sheet1!A:D".to_string()
}

fn default_sheets_base_url() -> String {
    "https://sheets.googleapis.com".to_string()
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: None,
            access_token: None,
            range: default_sheets_range(),
            base_url: default_sheets_base_url(),
        }
    }
}

impl SheetsConfig {
    pub fn is_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.spreadsheet_id) && filled(&self.access_token)
    }
}

/// 中继流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// 生成阶段总超时（秒，含重试）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// 上游失败时返回的备用音频文件
    #[serde(default)]
    pub fallback_audio_path: Option<PathBuf>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            fallback_audio_path: None,
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.audio.output_format, AudioFormat::Opus);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 10);
        assert_eq!(config.store.ttl_secs, 3600);
    }

    #[test]
    fn test_public_base_url() {
        let mut config = ServerConfig::default();
        assert_eq!(config.public_base_url(), "http://localhost:5000");

        config.base_url = Some("https://relay.example.com/".to_string());
        assert_eq!(config.public_base_url(), "https://relay.example.com");
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
    }

    #[test]
    fn test_channels_zero_keeps_source() {
        let audio = AudioConfig {
            channels: 0,
            ..Default::default()
        };
        assert_eq!(audio.transcode_config().channels, None);
        assert_eq!(AudioConfig::default().transcode_config().channels, Some(1));
    }

    #[test]
    fn test_sheets_requires_id_and_token() {
        let mut sheets = SheetsConfig::default();
        assert!(!sheets.is_configured());
        sheets.spreadsheet_id = Some("abc".to_string());
        assert!(!sheets.is_configured());
        sheets.access_token = Some("  ".to_string());
        assert!(!sheets.is_configured());
        sheets.access_token = Some("ya29.token".to_string());
        assert!(sheets.is_configured());
    }
}
