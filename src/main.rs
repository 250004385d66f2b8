//! Voice Relay - 文本 → Gemini 语音 → OGG/MP3/WAV → HTTP
//!
//! - Domain: speech/ (Bounded Context)
//! - Application: commands, queries, ports, retry
//! - Infrastructure: http, memory, adapters

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use voice_relay::application::{
    AudioFormat, ConversationLogPort, DisabledConversationLog, FallbackAudio, RateAdmitterPort,
    RelaySettings, SpeechGeneratorPort,
};
use voice_relay::config::{load_config, print_config, AppConfig};
use voice_relay::infrastructure::adapters::{
    FakeSpeechClient, FakeSpeechClientConfig, GeminiClientConfig, GeminiSpeechClient,
    PcmTranscoder, SheetsConversationLog, SheetsLogConfig,
};
use voice_relay::infrastructure::http::{AppState, HttpServer, ServerConfig};
use voice_relay::infrastructure::memory::{
    spawn_sweeper, InMemoryAudioStore, InMemoryAudioStoreConfig, RateLimitConfig,
    SlidingWindowRateLimiter, UnlimitedAdmitter,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);

    tracing::info!("Voice Relay v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 上游生成客户端
    let generator: Arc<dyn SpeechGeneratorPort> = if config.gemini.fake {
        Arc::new(FakeSpeechClient::new(FakeSpeechClientConfig {
            sample_rate: config.gemini.sample_rate,
            ..Default::default()
        }))
    } else {
        let gemini_config = GeminiClientConfig {
            api_key: config.gemini.api_key.clone(),
            base_url: config.gemini.base_url.clone(),
            model: config.gemini.model.clone(),
            voice_name: config.gemini.voice_name.clone(),
            language_code: config.gemini.language_code.clone(),
            modalities: config.gemini.modalities.clone(),
            sample_rate: config.gemini.sample_rate,
            timeout_secs: config.gemini.timeout_secs,
        };
        Arc::new(GeminiSpeechClient::new(gemini_config)?)
    };

    // 临时音频存储
    let audio_store = Arc::new(InMemoryAudioStore::new(InMemoryAudioStoreConfig {
        ttl: Duration::from_secs(config.store.ttl_secs),
        max_entries: config.store.max_entries,
    }));

    // 限流器
    let rate_admitter: Arc<dyn RateAdmitterPort> = if config.rate_limit.enabled {
        Arc::new(SlidingWindowRateLimiter::new(RateLimitConfig {
            max_requests: config.rate_limit.max_requests,
            window: Duration::from_secs(config.rate_limit.window_secs),
        }))
    } else {
        Arc::new(UnlimitedAdmitter)
    };

    // 表格日志（未配置时为空实现）
    let conversation_log: Arc<dyn ConversationLogPort> = if config.sheets.is_configured() {
        Arc::new(SheetsConversationLog::new(SheetsLogConfig {
            spreadsheet_id: config.sheets.spreadsheet_id.clone().unwrap_or_default(),
            access_token: config.sheets.access_token.clone().unwrap_or_default(),
            range: config.sheets.range.clone(),
            base_url: config.sheets.base_url.clone(),
            ..Default::default()
        })?)
    } else {
        Arc::new(DisabledConversationLog)
    };

    let settings = RelaySettings {
        public_base_url: config.server.public_base_url(),
        transcode: config.audio.transcode_config(),
        retry: config.retry.policy(),
        request_timeout: Duration::from_secs(config.relay.request_timeout_secs),
        fallback_audio: match &config.relay.fallback_audio_path {
            Some(path) => Some(load_fallback_audio(path).await?),
            None => None,
        },
    };

    // 后台清理过期音频与空闲限流窗口
    let sweeper = spawn_sweeper(
        audio_store.clone(),
        rate_admitter.clone(),
        Duration::from_secs(config.store.sweep_interval_secs),
    );

    // 创建 HTTP 服务器
    let server_config = ServerConfig::new(&config.server.host, config.server.port);
    let state = AppState::new(
        generator,
        Arc::new(PcmTranscoder::new()),
        audio_store,
        rate_admitter,
        conversation_log,
        settings,
    );

    let server = HttpServer::new(server_config, state);

    // 启动服务器（带优雅关闭）
    server
        .run_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal");
        })
        .await?;

    sweeper.abort();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// 初始化日志（RUST_LOG 优先于配置）
fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},voice_relay={},tower_http=debug",
        config.log.level, config.log.level
    );
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter));

    if config.log.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// 读取备用音频，MIME 由扩展名推断
async fn load_fallback_audio(path: &Path) -> anyhow::Result<FallbackAudio> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read fallback audio {:?}: {}", path, e))?;

    let mime_type = path
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse::<AudioFormat>().ok())
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream")
        .to_string();

    tracing::info!(path = ?path, size = bytes.len(), mime_type = %mime_type, "Fallback audio loaded");

    Ok(FallbackAudio { bytes, mime_type })
}
