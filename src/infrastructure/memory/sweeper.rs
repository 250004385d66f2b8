//! Background Sweeper
//!
//! 定期清理过期音频与空闲的限流窗口

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::application::ports::{AudioStorePort, RateAdmitterPort};

/// 启动后台清理任务
///
/// 第一次清理在一个完整间隔之后进行
pub fn spawn_sweeper(
    audio_store: Arc<dyn AudioStorePort>,
    rate_admitter: Arc<dyn RateAdmitterPort>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let expired = audio_store.purge_expired();
            let idle = rate_admitter.purge_idle();
            if expired > 0 || idle > 0 {
                let stats = audio_store.stats();
                tracing::debug!(
                    expired_audio = expired,
                    idle_clients = idle,
                    cached_audio = stats.total_entries,
                    cached_bytes = stats.total_size_bytes,
                    "Sweep completed"
                );
            }
        }
    })
}
