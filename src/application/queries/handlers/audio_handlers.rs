//! Audio Query Handlers

use std::sync::Arc;

use crate::application::error::RelayError;
use crate::application::ports::AudioStorePort;
use crate::application::queries::audio_queries::{GetAudioQuery, GetAudioResponse};

/// GetAudio Handler - 获取临时音频
pub struct GetAudioHandler {
    audio_store: Arc<dyn AudioStorePort>,
}

impl GetAudioHandler {
    pub fn new(audio_store: Arc<dyn AudioStorePort>) -> Self {
        Self { audio_store }
    }

    pub fn handle(&self, query: GetAudioQuery) -> Result<GetAudioResponse, RelayError> {
        let stored = self.audio_store.get(query.id())?;

        tracing::debug!(
            audio_id = %stored.id,
            size = stored.bytes.len(),
            mime_type = %stored.mime_type,
            "Serving stored audio"
        );

        Ok(GetAudioResponse {
            audio_data: stored.bytes,
            content_type: stored.mime_type,
        })
    }
}
