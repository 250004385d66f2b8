//! Speech Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpeechError {
    #[error("Field \"text\" is required")]
    EmptyText,

    #[error("Text too long: {len} chars (max {max})")]
    TextTooLong { len: usize, max: usize },

    #[error("Invalid PCM spec: {0}")]
    InvalidPcmSpec(String),
}
