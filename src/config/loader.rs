//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 约定俗成的裸环境变量（PORT、GEMINI_API_KEY 等）
//! 2. 前缀环境变量（RELAY_）
//! 3. 配置文件（config.toml）
//! 4. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 裸环境变量 → 配置键（同一键按顺序取第一个存在的变量）
const BARE_ENV_KEYS: &[(&str, &str)] = &[
    ("PORT", "server.port"),
    ("PUBLIC_BASE_URL", "server.base_url"),
    ("GEMINI_API_KEY", "gemini.api_key"),
    ("GOOGLE_API_KEY", "gemini.api_key"),
    ("SHEET_ID", "sheets.spreadsheet_id"),
    ("SHEETS_ACCESS_TOKEN", "sheets.access_token"),
];

/// 加载应用配置
///
/// # 环境变量示例
/// - `RELAY_SERVER__PORT=8080`
/// - `RELAY_GEMINI__MODEL=gemini-2.5-pro-preview-tts`
/// - `RELAY_AUDIO__OUTPUT_FORMAT=mp3`
/// - `RELAY_RATE_LIMIT__MAX_REQUESTS=10`
/// - `GEMINI_API_KEY=...`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with_env(config_path, |name| std::env::var(name).ok())
}

/// 加载配置，裸环境变量通过 `lookup` 读取
pub fn load_config_with_env<F>(config_path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut builder = Config::builder();

    // 1. 默认值由 serde(default) 提供，这里只设置需要显式出现的键
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 前缀环境变量
    // 前缀: RELAY_
    // 层级分隔符: __ (双下划线)
    // 例如: RELAY_STORE__TTL_SECS=600
    builder = builder.add_source(
        Environment::with_prefix("RELAY")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 裸环境变量（部署平台注入）
    let mut applied: Vec<&str> = Vec::new();
    for (var, key) in BARE_ENV_KEYS {
        if applied.contains(key) {
            continue;
        }
        if let Some(value) = lookup(*var).filter(|v| !v.trim().is_empty()) {
            builder = builder.set_override(*key, value)?;
            applied.push(*key);
        }
    }

    // 5. 构建并反序列化
    let config = builder.build()?;
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let fail = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if config.server.port == 0 {
        return fail("Server port cannot be 0");
    }

    if config.gemini.model.trim().is_empty() {
        return fail("Gemini model cannot be empty");
    }

    if !config.gemini.fake && config.gemini.api_key.trim().is_empty() {
        return fail("Gemini API key is required (set GEMINI_API_KEY) unless gemini.fake = true");
    }

    if config.gemini.modalities.is_empty() {
        return fail("At least one response modality is required");
    }

    if config.rate_limit.enabled
        && (config.rate_limit.window_secs == 0 || config.rate_limit.max_requests == 0)
    {
        return fail("Rate limit window and max_requests must be positive when enabled");
    }

    if config.retry.max_retries > 0 && config.retry.backoff_ms.is_empty() {
        return fail("Retry backoff schedule cannot be empty when retries are enabled");
    }

    if config.store.max_entries == 0 {
        return fail("Store capacity cannot be 0");
    }

    if config.store.ttl_secs == 0 || config.store.sweep_interval_secs == 0 {
        return fail("Store TTL and sweep interval must be positive");
    }

    if config.relay.request_timeout_secs == 0 {
        return fail("Request timeout cannot be 0");
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
///
/// 不输出任何凭据
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    if config.gemini.fake {
        tracing::info!("Generator: fake (silence)");
    } else {
        tracing::info!("Gemini Model: {}", config.gemini.model);
        tracing::info!("Gemini Voice: {}", config.gemini.voice_name);
        tracing::info!("Gemini Modalities: {:?}", config.gemini.modalities);
        tracing::info!(
            "Gemini API Key: {}",
            if config.gemini.api_key.is_empty() { "missing" } else { "set" }
        );
    }
    tracing::info!(
        "Output Format: {} ({} bps)",
        config.audio.output_format,
        config.audio.bitrate
    );
    tracing::info!(
        "Retry: {} retries, backoff {:?} ms",
        config.retry.max_retries,
        config.retry.backoff_ms
    );
    if config.rate_limit.enabled {
        tracing::info!(
            "Rate Limit: {} requests / {}s",
            config.rate_limit.max_requests,
            config.rate_limit.window_secs
        );
    } else {
        tracing::info!("Rate Limit: disabled");
    }
    tracing::info!(
        "Audio Store: TTL {}s, max {} entries",
        config.store.ttl_secs,
        config.store.max_entries
    );
    tracing::info!(
        "Sheets Logging: {}",
        if config.sheets.is_configured() { "enabled" } else { "disabled" }
    );
    if let Some(path) = &config.relay.fallback_audio_path {
        tracing::info!("Fallback Audio: {:?}", path);
    }
    tracing::info!("Request Timeout: {}s", config.relay.request_timeout_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}
