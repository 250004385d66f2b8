//! Gemini Speech Client - 调用 Gemini generateContent 生成语音
//!
//! 实现 SpeechGeneratorPort trait
//!
//! Gemini REST API:
//! POST {base_url}/v1beta/models/{model}:generateContent（x-goog-api-key 请求头）
//! Request: {"contents":[{"parts":[{"text":"..."}]}], "generationConfig":{...}}
//! Response: candidates[0].content.parts[*] 中的 inlineData（base64 音频）或 text

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::ports::{SpeechGeneratorPort, UpstreamError, UpstreamErrorKind};
use crate::domain::{GenerationRequest, GenerationResult, PcmSpec, UpstreamPayload};
use crate::infrastructure::adapters::transcoder::decode_wav;

// ============================================================================
// 请求体
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

// ============================================================================
// 响应体
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

// ============================================================================
// 客户端
// ============================================================================

/// 密钥放在请求头里，不进入 URL
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini 客户端配置
#[derive(Debug, Clone)]
pub struct GeminiClientConfig {
    /// API 密钥
    pub api_key: String,
    /// API 基础 URL
    pub base_url: String,
    /// 模型 ID
    pub model: String,
    /// 预置音色名
    pub voice_name: String,
    /// 语言代码（如 es-US），None 时由模型自动判断
    pub language_code: Option<String>,
    /// 响应模态（AUDIO / TEXT）
    pub modalities: Vec<String>,
    /// mime 中未声明采样率时使用的 PCM 采样率
    pub sample_rate: u32,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for GeminiClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-2.5-flash-preview-tts".to_string(),
            voice_name: "Zephyr".to_string(),
            language_code: None,
            modalities: vec!["AUDIO".to_string()],
            sample_rate: 24000,
            timeout_secs: 60,
        }
    }
}

impl GeminiClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    fn wants_audio(&self) -> bool {
        self.modalities
            .iter()
            .any(|m| m.eq_ignore_ascii_case("AUDIO"))
    }
}

/// Gemini 语音客户端
pub struct GeminiSpeechClient {
    client: Client,
    config: GeminiClientConfig,
}

impl GeminiSpeechClient {
    pub fn new(config: GeminiClientConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| UpstreamError::new(UpstreamErrorKind::Network, e.to_string()))?;

        Ok(Self { client, config })
    }

    /// generateContent URL（不含 key）
    fn generate_url(&self) -> String {
        let model = self
            .config
            .model
            .strip_prefix("models/")
            .unwrap_or(&self.config.model);
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    fn build_body(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let speech_config = self.config.wants_audio().then(|| SpeechConfig {
            voice_config: VoiceConfig {
                prebuilt_voice_config: PrebuiltVoiceConfig {
                    voice_name: self.config.voice_name.clone(),
                },
            },
            language_code: self.config.language_code.clone(),
        });

        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart {
                    text: request.text().to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: self
                    .config
                    .modalities
                    .iter()
                    .map(|m| m.to_uppercase())
                    .collect(),
                speech_config,
            },
        }
    }
}

#[async_trait]
impl SpeechGeneratorPort for GeminiSpeechClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResult, UpstreamError> {
        let body = self.build_body(request);

        tracing::debug!(
            url = %self.generate_url(),
            model = %self.config.model,
            text_len = request.text().len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_error_body(status.as_u16(), &error_text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| {
                UpstreamError::invalid_response(format!(
                    "Malformed response: {}",
                    error_chain(&e.without_url())
                ))
            })?;

        let result = parse_response(parsed, self.config.sample_rate)?;

        tracing::info!(
            payload = result.payload.kind(),
            audio_size = result.raw_audio().map(|a| a.len()).unwrap_or(0),
            has_text = result.generated_text.is_some(),
            "Gemini generation completed"
        );

        Ok(result)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// 按 reqwest 错误类型分类传输层错误
///
/// reqwest 的错误消息带完整 URL，转换前先去掉
fn transport_error(e: reqwest::Error) -> UpstreamError {
    let e = e.without_url();
    let message = error_chain(&e);
    if e.is_timeout() {
        UpstreamError::new(UpstreamErrorKind::Timeout, message)
    } else if e.is_connect() {
        UpstreamError::new(
            UpstreamErrorKind::Network,
            format!("Cannot connect to Gemini: {}", message),
        )
    } else if e.is_request() || e.is_body() || e.is_decode() {
        UpstreamError::new(UpstreamErrorKind::Network, message)
    } else {
        UpstreamError::from_transport(message)
    }
}

/// 错误及其 source 链拼成一行
fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// 将非 2xx 响应体分类为 UpstreamError
fn classify_error_body(status: u16, body: &str) -> UpstreamError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => UpstreamError::from_status(
            status,
            envelope.error.status.as_deref(),
            format!("HTTP {}: {}", status, envelope.error.message),
        ),
        Err(_) => UpstreamError::from_status(status, None, format!("HTTP {}: {}", status, body)),
    }
}

/// mime 类型拆分为 (小写主类型, rate 参数)
fn parse_mime(mime: &str) -> (String, Option<u32>) {
    let mut pieces = mime.split(';');
    let essence = pieces.next().unwrap_or("").trim().to_lowercase();
    let rate = pieces
        .filter_map(|p| p.split_once('='))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, v)| v.trim().parse().ok());
    (essence, rate)
}

/// 根据响应中实际存在的字段决定载荷形态
///
/// 多个 inlineData 片段按顺序拼接，mime 以第一个为准
pub fn parse_response(
    response: GenerateContentResponse,
    default_sample_rate: u32,
) -> Result<GenerationResult, UpstreamError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::invalid_response("Response has no candidates"))?;

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

    let mut texts: Vec<String> = Vec::new();
    let mut audio: Option<(String, Vec<u8>)> = None;

    for part in parts {
        if let Some(text) = part.text.filter(|t| !t.trim().is_empty()) {
            texts.push(text);
        }
        if let Some(inline) = part.inline_data {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| UpstreamError::invalid_response(format!("Bad inlineData: {}", e)))?;
            match audio.as_mut() {
                Some((_, buf)) => buf.extend_from_slice(&bytes),
                None => audio = Some((inline.mime_type, bytes)),
            }
        }
    }

    let generated_text = if texts.is_empty() {
        None
    } else {
        Some(texts.join(""))
    };

    let payload = match (audio, generated_text.clone()) {
        (Some((mime, bytes)), _) => audio_payload(&mime, bytes, default_sample_rate)?,
        (None, Some(text)) => UpstreamPayload::TextOnly { text },
        (None, None) => {
            return Err(UpstreamError::invalid_response(format!(
                "Response has neither audio nor text (finishReason: {})",
                if finish_reason.is_empty() { "none" } else { finish_reason.as_str() }
            )));
        }
    };

    Ok(GenerationResult::new(payload).with_text(generated_text))
}

fn audio_payload(
    mime: &str,
    bytes: Vec<u8>,
    default_sample_rate: u32,
) -> Result<UpstreamPayload, UpstreamError> {
    let (essence, rate) = parse_mime(mime);
    match essence.as_str() {
        "audio/l16" | "audio/pcm" => Ok(UpstreamPayload::Pcm {
            bytes,
            spec: PcmSpec::s16_mono(rate.unwrap_or(default_sample_rate)),
        }),
        "audio/wav" | "audio/x-wav" | "audio/wave" => {
            let (pcm, spec) = decode_wav(&bytes)
                .map_err(|e| UpstreamError::invalid_response(format!("Bad WAV payload: {}", e)))?;
            Ok(UpstreamPayload::Pcm { bytes: pcm, spec })
        }
        _ => Ok(UpstreamPayload::Encoded {
            bytes,
            mime_type: mime.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        http::{HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::application::{call_with_backoff, RetryError, RetryPolicy};

    const TEST_KEY: &str = "SECRET-KEY-123";

    fn b64(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    fn parse(value: Value) -> Result<GenerationResult, UpstreamError> {
        parse_response(serde_json::from_value(value).unwrap(), 24000)
    }

    fn response_with_parts(parts: Value) -> Value {
        json!({ "candidates": [{ "content": { "role": "model", "parts": parts } }] })
    }

    #[test]
    fn test_l16_with_rate_is_pcm() {
        let result = parse(response_with_parts(json!([
            { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=16000", "data": b64(&[0u8; 8]) } }
        ])))
        .unwrap();

        assert_eq!(
            result.payload,
            UpstreamPayload::Pcm {
                bytes: vec![0u8; 8],
                spec: PcmSpec::s16_mono(16000)
            }
        );
        assert_eq!(result.generated_text, None);
    }

    #[test]
    fn test_pcm_without_rate_uses_default() {
        let result = parse(response_with_parts(json!([
            { "inlineData": { "mimeType": "audio/pcm", "data": b64(&[1, 2, 3, 4]) } }
        ])))
        .unwrap();
        match result.payload {
            UpstreamPayload::Pcm { spec, .. } => assert_eq!(spec.sample_rate, 24000),
            other => panic!("expected pcm, got {:?}", other),
        }
    }

    #[test]
    fn test_audio_chunks_are_concatenated() {
        let result = parse(response_with_parts(json!([
            { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": b64(&[1, 2]) } },
            { "inlineData": { "mimeType": "audio/L16;rate=24000", "data": b64(&[3, 4]) } }
        ])))
        .unwrap();
        assert_eq!(result.raw_audio(), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn test_ogg_is_encoded() {
        let result = parse(response_with_parts(json!([
            { "text": "¡Hola!" },
            { "inlineData": { "mimeType": "audio/ogg", "data": b64(b"OggS") } }
        ])))
        .unwrap();
        assert_eq!(result.payload.kind(), "encoded");
        assert_eq!(result.mime_type(), "audio/ogg");
        assert_eq!(result.generated_text.as_deref(), Some("¡Hola!"));
    }

    #[test]
    fn test_text_only() {
        let result = parse(response_with_parts(json!([{ "text": "solo texto" }]))).unwrap();
        assert_eq!(
            result.payload,
            UpstreamPayload::TextOnly {
                text: "solo texto".to_string()
            }
        );
        assert_eq!(result.generated_text.as_deref(), Some("solo texto"));
    }

    #[test]
    fn test_wav_is_decoded_to_pcm() {
        let mut wav = Vec::new();
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36u32 + 8).to_le_bytes());
        wav.extend_from_slice(b"WAVEfmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes());
        wav.extend_from_slice(&8000u32.to_le_bytes());
        wav.extend_from_slice(&16000u32.to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&8u32.to_le_bytes());
        wav.extend_from_slice(&[0u8; 8]);

        let result = parse(response_with_parts(json!([
            { "inlineData": { "mimeType": "audio/wav", "data": b64(&wav) } }
        ])))
        .unwrap();
        match result.payload {
            UpstreamPayload::Pcm { bytes, spec } => {
                assert_eq!(spec, PcmSpec::s16_mono(8000));
                assert_eq!(bytes.len(), 8);
            }
            other => panic!("expected pcm, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_response_is_invalid() {
        let err = parse(json!({ "candidates": [] })).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::InvalidResponse);

        let err = parse(json!({ "candidates": [{ "finishReason": "SAFETY" }] })).unwrap_err();
        assert_eq!(err.kind, UpstreamErrorKind::InvalidResponse);
        assert!(err.message.contains("SAFETY"));
    }

    #[test]
    fn test_error_body_classification() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error_body(429, body).is_rate_limited());

        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(classify_error_body(400, body).kind, UpstreamErrorKind::Rejected);

        assert_eq!(
            classify_error_body(503, "<html>overloaded</html>").kind,
            UpstreamErrorKind::Unavailable
        );
    }

    #[test]
    fn test_request_body_shape() {
        let config = GeminiClientConfig {
            language_code: Some("es-US".to_string()),
            ..GeminiClientConfig::new("k")
        };
        let client = GeminiSpeechClient::new(config).unwrap();
        let body = client.build_body(&GenerationRequest::new("hola").unwrap());
        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value["contents"][0]["parts"][0]["text"], "hola");
        assert_eq!(value["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            value["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]["voiceName"],
            "Zephyr"
        );
        assert_eq!(value["generationConfig"]["speechConfig"]["languageCode"], "es-US");
    }

    #[test]
    fn test_generate_url_strips_models_prefix() {
        let config = GeminiClientConfig {
            model: "models/gemini-test".to_string(),
            ..GeminiClientConfig::new("k").with_base_url("http://localhost:1/")
        };
        let client = GeminiSpeechClient::new(config).unwrap();
        assert_eq!(
            client.generate_url(),
            "http://localhost:1/v1beta/models/gemini-test:generateContent"
        );
    }

    /// 启动一个本地假 Gemini 服务
    async fn spawn_upstream(status: StatusCode, body: Value) -> String {
        let app = Router::new().route(
            "/v1beta/models/:call",
            post(move |headers: HeaderMap| {
                let body = body.clone();
                async move {
                    assert_eq!(
                        headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()),
                        Some("test-key")
                    );
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_generate_against_local_upstream() {
        let base_url = spawn_upstream(
            StatusCode::OK,
            response_with_parts(json!([
                { "inlineData": { "mimeType": "audio/L16;codec=pcm;rate=16000", "data": b64(&[0u8; 320]) } }
            ])),
        )
        .await;

        let client =
            GeminiSpeechClient::new(GeminiClientConfig::new("test-key").with_base_url(base_url))
                .unwrap();
        let result = client
            .generate(&GenerationRequest::new("hola").unwrap())
            .await
            .unwrap();
        assert_eq!(result.payload.kind(), "pcm");
        assert_eq!(result.raw_audio().map(|a| a.len()), Some(320));
    }

    #[tokio::test]
    async fn test_quota_status_is_rate_limited() {
        let base_url = spawn_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            json!({ "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" } }),
        )
        .await;

        let client =
            GeminiSpeechClient::new(GeminiClientConfig::new("test-key").with_base_url(base_url))
                .unwrap();
        let err = client
            .generate(&GenerationRequest::new("hola").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.message.contains("exhausted"));
    }

    /// 接受连接后立即关闭，返回地址与已接受连接数
    async fn spawn_dropping_listener() -> (String, Arc<AtomicUsize>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = accepted.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(stream);
            }
        });
        (format!("http://{}", addr), accepted)
    }

    /// 绑定后立即释放的端口，连接会被拒绝
    async fn refused_base_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    fn client_for(base_url: String) -> GeminiSpeechClient {
        GeminiSpeechClient::new(GeminiClientConfig::new(TEST_KEY).with_base_url(base_url)).unwrap()
    }

    #[tokio::test]
    async fn test_refused_connection_hides_key() {
        let client = client_for(refused_base_url().await);
        let err = client
            .generate(&GenerationRequest::new("hola").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.kind, UpstreamErrorKind::Network);
        assert!(!err.message.contains(TEST_KEY));
        assert!(!err.to_string().contains(TEST_KEY));
        assert!(!err.message.contains("generateContent"));
    }

    #[tokio::test]
    async fn test_dropped_connection_is_network_and_not_retried() {
        let (base_url, accepted) = spawn_dropping_listener().await;
        let client = client_for(base_url);
        let request = GenerationRequest::new("hola").unwrap();
        let calls = AtomicUsize::new(0);

        let result = call_with_backoff(&RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            client.generate(&request)
        })
        .await;

        match result {
            Err(RetryError::Permanent(err)) => {
                assert_eq!(err.kind, UpstreamErrorKind::Network);
                assert!(!err.message.contains(TEST_KEY));
            }
            other => panic!("expected permanent network error, got {:?}", other.map(|r| r.payload.kind())),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(accepted.load(Ordering::SeqCst) >= 1);
    }
}
