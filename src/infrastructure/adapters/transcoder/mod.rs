//! Transcoder Adapter - PCM 转码实现

mod pcm_transcoder;

pub use pcm_transcoder::{decode_wav, PcmTranscoder};
