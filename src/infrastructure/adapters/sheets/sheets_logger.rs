//! Sheets Conversation Log - 追加对话记录到 Google Sheets
//!
//! 实现 ConversationLogPort trait
//!
//! Sheets API:
//! POST {base_url}/v4/spreadsheets/{id}/values/{range}:append?valueInputOption=RAW
//! Authorization: Bearer {access_token}
//! Request: {"values": [[timestamp, input, generated, audio_ref]]}

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{ConversationLogPort, LogError, LogRow};

#[derive(Debug, Serialize)]
struct AppendRequest {
    values: Vec<Vec<String>>,
}

/// Sheets 日志配置
#[derive(Debug, Clone)]
pub struct SheetsLogConfig {
    pub spreadsheet_id: String,
    /// OAuth access token（由外部注入）
    pub access_token: String,
    /// A1 表示法的目标区域
    pub range: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for SheetsLogConfig {
    fn default() -> Self {
        Self {
            spreadsheet_id: String::new(),
            access_token: String::new(),
            range: "Sheet1!A:D".to_string(),
            base_url: "https://sheets.googleapis.com".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Google Sheets 对话日志
pub struct SheetsConversationLog {
    client: Client,
    config: SheetsLogConfig,
}

impl SheetsConversationLog {
    pub fn new(config: SheetsLogConfig) -> Result<Self, LogError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LogError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn append_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}:append",
            self.config.base_url.trim_end_matches('/'),
            self.config.spreadsheet_id,
            self.config.range
        )
    }
}

#[async_trait]
impl ConversationLogPort for SheetsConversationLog {
    async fn append(&self, row: LogRow) -> Result<(), LogError> {
        let body = AppendRequest {
            values: vec![row.into_values()],
        };

        let response = self
            .client
            .post(self.append_url())
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(&self.config.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| LogError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LogError::ServiceError(format!(
                "HTTP {}: {}",
                status, error_text
            )));
        }

        tracing::debug!(spreadsheet_id = %self.config.spreadsheet_id, "Row appended to sheet");
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, Value)>>>;

    async fn spawn_sheets(status: StatusCode) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route(
                "/v4/spreadsheets/:id/values/:range",
                post(
                    move |State(captured): State<Captured>,
                          headers: HeaderMap,
                          Json(body): Json<Value>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_string();
                        captured.lock().unwrap().push((auth, body));
                        status
                    },
                ),
            )
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn row() -> LogRow {
        LogRow {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            input_text: "hola".to_string(),
            generated_text: "(audio generado por Gemini)".to_string(),
            audio_ref: "http://localhost:5000/audio/abc.ogg".to_string(),
        }
    }

    fn logger(base_url: String) -> SheetsConversationLog {
        SheetsConversationLog::new(SheetsLogConfig {
            spreadsheet_id: "sheet-1".to_string(),
            access_token: "token-1".to_string(),
            base_url,
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_append_posts_row_values() {
        let (base_url, captured) = spawn_sheets(StatusCode::OK).await;
        logger(base_url).append(row()).await.unwrap();

        let captured = captured.lock().unwrap();
        assert_eq!(captured.len(), 1);
        let (auth, body) = &captured[0];
        assert_eq!(auth, "Bearer token-1");
        assert_eq!(body["values"][0][1], "hola");
        assert_eq!(body["values"][0][2], "(audio generado por Gemini)");
        assert_eq!(body["values"][0][3], "http://localhost:5000/audio/abc.ogg");
    }

    #[tokio::test]
    async fn test_service_error_is_reported() {
        let (base_url, _) = spawn_sheets(StatusCode::FORBIDDEN).await;
        let err = logger(base_url).append(row()).await.unwrap_err();
        assert!(matches!(err, LogError::ServiceError(_)));
    }

    #[test]
    fn test_append_url() {
        let logger = logger("https://sheets.example/".to_string());
        assert_eq!(
            logger.append_url(),
            "https://sheets.example/v4/spreadsheets/sheet-1/values/Sheet1!A:D:append"
        );
    }
}
