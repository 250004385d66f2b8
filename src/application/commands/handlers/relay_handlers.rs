//! Relay Command Handlers
//!
//! 单个请求的处理流程:
//! Received → Validated → RateChecked → Generating → (Transcoding)? → Stored → Responded
//!
//! Stored 之前的任一步骤都可以提前失败；日志写入在 Responded 之后异步进行

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::application::commands::relay_commands::*;
use crate::application::error::RelayError;
use crate::application::ports::{
    Admission, AudioFormat, AudioStorePort, AudioTranscoderPort, ConversationLogPort, LogRow,
    RateAdmitterPort, SpeechGeneratorPort, TranscodeConfig,
};
use crate::application::retry::{call_with_backoff, RetryPolicy};
use crate::domain::{GenerationRequest, GenerationResult, UpstreamPayload};

/// 上游失败时使用的备用音频
#[derive(Debug, Clone)]
pub struct FallbackAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// 中继设置
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// 音频 URL 的公开 Base URL
    pub public_base_url: String,
    /// PCM 转码配置
    pub transcode: TranscodeConfig,
    /// 上游重试策略
    pub retry: RetryPolicy,
    /// 单个请求生成阶段的总超时（含重试）
    pub request_timeout: Duration,
    /// 备用音频
    pub fallback_audio: Option<FallbackAudio>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            public_base_url: "http://localhost:5000".to_string(),
            transcode: TranscodeConfig::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(30),
            fallback_audio: None,
        }
    }
}

/// RelayChat Handler - 文本 → 语音中继
pub struct RelayChatHandler {
    generator: Arc<dyn SpeechGeneratorPort>,
    transcoder: Arc<dyn AudioTranscoderPort>,
    audio_store: Arc<dyn AudioStorePort>,
    rate_admitter: Arc<dyn RateAdmitterPort>,
    conversation_log: Arc<dyn ConversationLogPort>,
    settings: RelaySettings,
}

impl RelayChatHandler {
    pub fn new(
        generator: Arc<dyn SpeechGeneratorPort>,
        transcoder: Arc<dyn AudioTranscoderPort>,
        audio_store: Arc<dyn AudioStorePort>,
        rate_admitter: Arc<dyn RateAdmitterPort>,
        conversation_log: Arc<dyn ConversationLogPort>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            generator,
            transcoder,
            audio_store,
            rate_admitter,
            conversation_log,
            settings,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub async fn handle(&self, cmd: RelayChatCommand) -> Result<RelayChatResponse, RelayError> {
        // Validated
        let request = GenerationRequest::new(&cmd.text)?;

        // RateChecked
        if let Admission::Rejected { retry_after } = self.rate_admitter.admit(&cmd.client_id) {
            tracing::warn!(
                client_id = %cmd.client_id,
                retry_after_secs = retry_after.as_secs(),
                "Request rejected by rate limiter"
            );
            return Err(RelayError::RateLimited { retry_after });
        }

        tracing::info!(
            client_id = %cmd.client_id,
            text_len = request.text().chars().count(),
            "Relaying text to speech generator"
        );

        // Generating
        let result = match self.generate(&request).await {
            Ok(result) => result,
            Err(err) => return self.fallback_or_fail(&request, err),
        };

        let generated_text = result.generated_text.clone();

        // (Transcoding)? → Stored
        let audio = match result.payload {
            UpstreamPayload::Pcm { bytes, spec } => {
                let transcoder = self.transcoder.clone();
                let config = self.settings.transcode.clone();
                let transcoded = tokio::task::spawn_blocking(move || {
                    transcoder.pcm_to_container(&bytes, spec, &config)
                })
                .await
                .map_err(|e| RelayError::internal(format!("Transcode task failed: {}", e)))??;

                tracing::debug!(
                    format = %transcoded.format,
                    original_size = transcoded.original_size,
                    transcoded_size = transcoded.transcoded_size,
                    duration_ms = transcoded.duration_ms,
                    "PCM transcoded"
                );

                Some(self.store_audio(
                    transcoded.audio_data,
                    transcoded.format.mime_type(),
                    Some(transcoded.duration_ms),
                ))
            }
            UpstreamPayload::Encoded { bytes, mime_type } => {
                Some(self.store_audio(bytes, &mime_type, None))
            }
            UpstreamPayload::TextOnly { .. } => {
                tracing::info!("Upstream returned text only, no audio to store");
                None
            }
        };

        let response = RelayChatResponse {
            generated_text,
            audio,
            fallback: false,
        };

        self.spawn_log_row(&request, &response);

        Ok(response)
    }

    /// 调用上游（带重试与总超时）
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, RelayError> {
        let generator = self.generator.clone();
        let attempt = call_with_backoff(&self.settings.retry, || {
            let generator = generator.clone();
            async move { generator.generate(request).await }
        });

        match tokio::time::timeout(self.settings.request_timeout, attempt).await {
            Ok(result) => result.map_err(RelayError::from),
            Err(_) => Err(RelayError::upstream_timeout(self.settings.request_timeout)),
        }
    }

    /// 上游失败时尝试返回备用音频
    ///
    /// 限流（配额耗尽）不使用备用音频，调用方应稍后重试
    fn fallback_or_fail(
        &self,
        request: &GenerationRequest,
        err: RelayError,
    ) -> Result<RelayChatResponse, RelayError> {
        let fallback = match (&self.settings.fallback_audio, err.is_throttled()) {
            (Some(fallback), false) => fallback,
            _ => {
                tracing::error!(generator = self.generator.name(), error = %err, "Speech generation failed");
                return Err(err);
            }
        };

        tracing::warn!(error = %err, "Speech generation failed, serving fallback audio");

        let audio = self.store_audio(fallback.bytes.clone(), &fallback.mime_type, None);
        let response = RelayChatResponse {
            generated_text: None,
            audio: Some(audio),
            fallback: true,
        };
        self.spawn_log_row(request, &response);
        Ok(response)
    }

    fn store_audio(&self, bytes: Vec<u8>, mime_type: &str, duration_ms: Option<u64>) -> RelayedAudio {
        let id = self.audio_store.put(bytes.clone(), mime_type);
        let extension = AudioFormat::from_mime(mime_type)
            .map(|f| f.extension())
            .unwrap_or("bin");
        let url = format!(
            "{}/audio/{}.{}",
            self.settings.public_base_url.trim_end_matches('/'),
            id,
            extension
        );

        tracing::info!(audio_id = %id, size = bytes.len(), mime_type = %mime_type, "Audio stored");

        RelayedAudio {
            id,
            url,
            mime_type: mime_type.to_string(),
            bytes,
            duration_ms,
        }
    }

    /// 异步追加日志行，失败只记录，不影响响应
    fn spawn_log_row(&self, request: &GenerationRequest, response: &RelayChatResponse) {
        if !self.conversation_log.is_enabled() {
            return;
        }

        let row = LogRow {
            timestamp: Utc::now(),
            input_text: request.text().to_string(),
            generated_text: response
                .generated_text
                .clone()
                .unwrap_or_else(|| AUDIO_ONLY_PLACEHOLDER.to_string()),
            audio_ref: response
                .audio
                .as_ref()
                .map(|a| a.url.clone())
                .unwrap_or_default(),
        };

        let conversation_log = self.conversation_log.clone();
        tokio::spawn(async move {
            match conversation_log.append(row).await {
                Ok(()) => tracing::debug!("Conversation row appended"),
                Err(e) => tracing::warn!(error = %e, "Failed to append conversation row"),
            }
        });
    }
}
