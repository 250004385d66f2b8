//! Sliding Window Rate Limiter
//!
//! 每个客户端维护一个最近准入时间戳的有序队列，访问时惰性清理过期记录

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::application::ports::{Admission, RateAdmitterPort};

/// 限流配置
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// 窗口内允许的最大请求数
    pub max_requests: usize,
    /// 窗口长度
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(10),
        }
    }
}

/// 滑动窗口限流器
pub struct SlidingWindowRateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    config: RateLimitConfig,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        tracing::info!(
            max_requests = config.max_requests,
            window_secs = config.window.as_secs(),
            "SlidingWindowRateLimiter initialized"
        );
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= length {
                window.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SlidingWindowRateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RateAdmitterPort for SlidingWindowRateLimiter {
    fn admit(&self, client_id: &str) -> Admission {
        let now = Instant::now();
        // entry() 持有分片写锁，同一客户端的检查与追加是原子的
        let mut window = self.windows.entry(client_id.to_string()).or_default();
        Self::prune(&mut window, now, self.config.window);

        if window.len() >= self.config.max_requests {
            let retry_after = window
                .front()
                .map(|oldest| self.config.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.config.window);
            return Admission::Rejected {
                retry_after: retry_after.max(Duration::from_secs(1)),
            };
        }

        window.push_back(now);
        Admission::Allowed
    }

    fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            Self::prune(window, now, self.config.window);
            !window.is_empty()
        });
        before.saturating_sub(self.windows.len())
    }
}

/// 不限流（rate_limit.enabled = false）
pub struct UnlimitedAdmitter;

impl RateAdmitterPort for UnlimitedAdmitter {
    fn admit(&self, _client_id: &str) -> Admission {
        Admission::Allowed
    }

    fn purge_idle(&self) -> usize {
        0
    }
}
