//! Audio Queries - 音频查询

/// 获取临时音频
///
/// `audio_ref` 可以带扩展名（如 `abc.ogg`），扩展名会被忽略
#[derive(Debug, Clone)]
pub struct GetAudioQuery {
    pub audio_ref: String,
}

impl GetAudioQuery {
    pub fn id(&self) -> &str {
        self.audio_ref
            .split_once('.')
            .map(|(id, _)| id)
            .unwrap_or(&self.audio_ref)
    }
}

/// 获取音频响应
#[derive(Debug, Clone)]
pub struct GetAudioResponse {
    pub audio_data: Vec<u8>,
    pub content_type: String,
}
