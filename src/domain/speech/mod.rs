//! Speech Context - 语音生成限界上下文
//!
//! 职责:
//! - 生成请求校验（文本 trim、非空）
//! - 上游响应形态建模（PCM / 已编码容器 / 纯文本）

mod entities;
mod errors;
mod value_objects;

pub use entities::{GenerationResult, UpstreamPayload};
pub use errors::SpeechError;
pub use value_objects::{GenerationRequest, PcmSpec};
