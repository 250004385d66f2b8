//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（SpeechGenerator、AudioTranscoder、AudioStore 等）
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - retry: 上游调用的有界重试
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod retry;

// Re-exports
pub use commands::{
    handlers::{FallbackAudio, RelayChatHandler, RelaySettings},
    RelayChatCommand, RelayChatResponse, RelayedAudio, AUDIO_ONLY_PLACEHOLDER,
};

pub use error::RelayError;

pub use ports::{
    // Speech generator
    SpeechGeneratorPort,
    UpstreamError,
    UpstreamErrorKind,
    // Transcoder
    AudioFormat,
    AudioTranscoderPort,
    TranscodeConfig,
    TranscodeError,
    // Store
    AudioStorePort,
    StoreError,
    StoredAudio,
    // Rate limiting
    Admission,
    RateAdmitterPort,
    // Conversation log
    ConversationLogPort,
    DisabledConversationLog,
    LogError,
    LogRow,
};

pub use queries::{
    handlers::GetAudioHandler,
    GetAudioQuery,
    GetAudioResponse,
};

pub use retry::{call_with_backoff, RetryError, RetryPolicy, Retryable};
