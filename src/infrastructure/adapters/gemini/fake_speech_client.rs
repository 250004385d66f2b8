//! Fake Speech Client - 用于本地运行和测试的生成客户端
//!
//! 不调用 Gemini，始终返回固定时长的 PCM 静音

use async_trait::async_trait;
use std::time::Duration;

use crate::application::ports::{SpeechGeneratorPort, UpstreamError};
use crate::domain::{GenerationRequest, GenerationResult, PcmSpec, UpstreamPayload};

/// Fake Speech Client 配置
#[derive(Debug, Clone)]
pub struct FakeSpeechClientConfig {
    /// 返回的静音时长（毫秒）
    pub duration_ms: u64,
    /// 采样率
    pub sample_rate: u32,
    /// 模拟的生成延迟
    pub latency: Duration,
}

impl Default for FakeSpeechClientConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1000,
            sample_rate: 24000,
            latency: Duration::from_millis(200),
        }
    }
}

/// Fake Speech Client
pub struct FakeSpeechClient {
    config: FakeSpeechClientConfig,
}

impl FakeSpeechClient {
    pub fn new(config: FakeSpeechClientConfig) -> Self {
        tracing::info!(
            duration_ms = config.duration_ms,
            sample_rate = config.sample_rate,
            "FakeSpeechClient initialized"
        );
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeSpeechClientConfig::default())
    }
}

#[async_trait]
impl SpeechGeneratorPort for FakeSpeechClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, UpstreamError> {
        tracing::debug!(
            text_len = request.text().len(),
            "FakeSpeechClient: returning silence"
        );

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        let spec = PcmSpec::s16_mono(self.config.sample_rate);
        let frames = self.config.sample_rate as u64 * self.config.duration_ms / 1000;
        let bytes = vec![0u8; frames as usize * spec.frame_bytes()];

        Ok(GenerationResult::new(UpstreamPayload::Pcm { bytes, spec }))
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_returns_silence_of_configured_length() {
        let client = FakeSpeechClient::new(FakeSpeechClientConfig {
            duration_ms: 250,
            sample_rate: 16000,
            ..Default::default()
        });

        let result = client
            .generate(&GenerationRequest::new("hola").unwrap())
            .await
            .unwrap();
        match result.payload {
            UpstreamPayload::Pcm { bytes, spec } => {
                assert_eq!(bytes.len(), 8000);
                assert_eq!(spec, PcmSpec::s16_mono(16000));
                assert_eq!(spec.duration_ms(bytes.len()), 250);
            }
            other => panic!("expected pcm, got {:?}", other),
        }
    }
}
