//! Gemini Adapter - 语音生成客户端实现

mod fake_speech_client;
mod gemini_client;

pub use fake_speech_client::{FakeSpeechClient, FakeSpeechClientConfig};
pub use gemini_client::*;
