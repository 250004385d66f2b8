//! Domain Layer - 领域层
//!
//! 包含一个限界上下文:
//! - Speech Context: 生成请求与上游响应形态

pub mod speech;

pub use speech::{GenerationRequest, GenerationResult, PcmSpec, SpeechError, UpstreamPayload};
