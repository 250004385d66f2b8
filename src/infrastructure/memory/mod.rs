//! Memory Layer - In-Memory State Management
//!
//! 进程内共享状态：临时音频存储与限流窗口

mod audio_store;
mod rate_limiter;
mod sweeper;

pub use audio_store::{InMemoryAudioStore, InMemoryAudioStoreConfig};
pub use rate_limiter::{RateLimitConfig, SlidingWindowRateLimiter, UnlimitedAdmitter};
pub use sweeper::spawn_sweeper;
