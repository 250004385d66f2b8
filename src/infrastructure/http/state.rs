//! Application State
//!
//! 包含所有 Command/Query Handlers 与共享端口

use std::sync::Arc;

use crate::application::{
    // Command handlers
    RelayChatHandler, RelaySettings,
    // Query handlers
    GetAudioHandler,
    // Ports
    AudioStorePort, AudioTranscoderPort, ConversationLogPort, RateAdmitterPort,
    SpeechGeneratorPort,
};

/// 应用状态
///
/// 限流器与音频存储在 main 中构造一次，由所有请求共享
pub struct AppState {
    // ========== Ports ==========
    pub audio_store: Arc<dyn AudioStorePort>,
    pub conversation_log: Arc<dyn ConversationLogPort>,
    pub generator_name: &'static str,

    // ========== Command Handlers ==========
    pub relay_handler: RelayChatHandler,

    // ========== Query Handlers ==========
    pub get_audio_handler: GetAudioHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        generator: Arc<dyn SpeechGeneratorPort>,
        transcoder: Arc<dyn AudioTranscoderPort>,
        audio_store: Arc<dyn AudioStorePort>,
        rate_admitter: Arc<dyn RateAdmitterPort>,
        conversation_log: Arc<dyn ConversationLogPort>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            // Ports
            audio_store: audio_store.clone(),
            conversation_log: conversation_log.clone(),
            generator_name: generator.name(),

            // Command handlers
            relay_handler: RelayChatHandler::new(
                generator,
                transcoder,
                audio_store.clone(),
                rate_admitter,
                conversation_log,
                settings,
            ),

            // Query handlers
            get_audio_handler: GetAudioHandler::new(audio_store),
        }
    }
}
