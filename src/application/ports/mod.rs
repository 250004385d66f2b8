//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod audio_store;
mod audio_transcoder;
mod conversation_log;
mod rate_admitter;
mod speech_generator;

pub use audio_store::{AudioStorePort, StoreError, StoreStats, StoredAudio};
pub use audio_transcoder::{
    AudioFormat, AudioTranscoderPort, TranscodeConfig, TranscodeError, TranscodeResult,
};
pub use conversation_log::{ConversationLogPort, DisabledConversationLog, LogError, LogRow};
pub use rate_admitter::{Admission, RateAdmitterPort};
pub use speech_generator::{
    looks_rate_limited, SpeechGeneratorPort, UpstreamError, UpstreamErrorKind,
};
