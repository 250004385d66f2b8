//! HTTP Server
//!
//! Axum HTTP 服务器启动和配置

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::Router;
use http::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use http::Method;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::middleware::error_logging_middleware;
use super::routes::create_routes;
use super::state::AppState;

/// 请求体上限，/chat 只接收短文本
const MAX_BODY_BYTES: usize = 256 * 1024;

/// 服务器配置
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// HTTP 服务器
pub struct HttpServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    /// 构建 Router
    ///
    /// 层顺序（外到内）：CORS → Trace → 错误日志 → 请求体上限
    fn build_router(&self) -> Router {
        create_routes()
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .layer(middleware::from_fn(error_logging_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(relay_cors())
            .with_state(self.state.clone())
    }

    /// 启动服务器，shutdown_signal 完成后停止接收新连接
    ///
    /// 以 ConnectInfo 方式提供服务，限流器在没有 X-Forwarded-For 时使用对端地址
    pub async fn run_with_shutdown<F>(self, shutdown_signal: F) -> Result<(), std::io::Error>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.addr()).await?;
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "Voice relay listening");

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal)
        .await?;

        info!(addr = %local_addr, "HTTP server stopped");
        Ok(())
    }
}

/// 浏览器前端直接调用 /chat 与 /audio，允许任意来源
fn relay_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .expose_headers([RETRY_AFTER])
        .max_age(Duration::from_secs(3600))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{DisabledConversationLog, RelaySettings};
    use crate::infrastructure::adapters::{FakeSpeechClient, PcmTranscoder};
    use crate::infrastructure::memory::{InMemoryAudioStore, UnlimitedAdmitter};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    fn server() -> HttpServer {
        let state = AppState::new(
            Arc::new(FakeSpeechClient::with_defaults()),
            Arc::new(PcmTranscoder::new()),
            Arc::new(InMemoryAudioStore::default()),
            Arc::new(UnlimitedAdmitter),
            Arc::new(DisabledConversationLog),
            RelaySettings::default(),
        );
        HttpServer::new(ServerConfig::default(), state)
    }

    #[test]
    fn test_server_config_addr() {
        assert_eq!(ServerConfig::default().addr(), "0.0.0.0:5000");
        assert_eq!(ServerConfig::new("127.0.0.1", 8080).addr(), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_cors_preflight_is_allowed() {
        let response = server()
            .build_router()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/chat")
                    .header("origin", "https://example.com")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let body = format!(r#"{{"text":"{}"}}"#, "a".repeat(MAX_BODY_BYTES));
        let response = server()
            .build_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/chat")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
