//! Voice Relay - 文本 → 生成式语音中继服务
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Speech Context: 生成请求校验与上游响应形态
//!
//! 应用层 (application/):
//! - Ports: 端口定义（SpeechGenerator, AudioTranscoder, AudioStore, RateAdmitter, ConversationLog）
//! - Commands: 中继命令处理器（限流 → 生成 → 转码 → 存储 → 日志）
//! - Queries: 临时音频查询
//! - Retry: 上游调用的有界重试与退避
//!
//! 基础设施层 (infrastructure/):
//! - HTTP: /chat、/audio、/health
//! - Memory: 临时音频存储、滑动窗口限流、后台清理
//! - Adapters: Gemini 客户端、PCM 转码、Google Sheets 日志

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
