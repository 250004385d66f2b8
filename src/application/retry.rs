//! Retry / Backoff - 上游调用的有界重试
//!
//! 只有瞬时错误（限流、服务暂不可用）会被重试，其他错误立即返回

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::application::ports::{UpstreamError, UpstreamErrorKind};

/// 可判断是否为瞬时错误的错误类型
pub trait Retryable {
    fn is_transient(&self) -> bool;
}

impl Retryable for UpstreamError {
    fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            UpstreamErrorKind::RateLimited | UpstreamErrorKind::Unavailable
        )
    }
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 首次调用之外的最大重试次数
    pub max_retries: u32,
    /// 退避时间表，第 n 次重试前等待 `backoff[min(n-1, len-1)]`
    pub backoff: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
            ],
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Vec<Duration>) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(0, Vec::new())
    }

    /// 第 `attempt` 次失败后的等待时间（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if self.backoff.is_empty() {
            return Duration::ZERO;
        }
        let idx = (attempt.saturating_sub(1) as usize).min(self.backoff.len() - 1);
        self.backoff[idx]
    }
}

/// 重试包装后的错误
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// 非瞬时错误，未重试
    #[error("{0}")]
    Permanent(E),

    /// 瞬时错误，重试次数已耗尽
    #[error("retries exhausted after {attempts} attempts: {error}")]
    Exhausted { error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    pub fn inner(&self) -> &E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { error, .. } => error,
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent(e) => e,
            RetryError::Exhausted { error, .. } => error,
        }
    }
}

/// 带退避的调用
///
/// 每次调用 `op` 都会重新构造 future，失败后按策略等待再重试
pub async fn call_with_backoff<T, E, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Upstream call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if !error.is_transient() => {
                tracing::debug!(attempt = attempt, error = %error, "Permanent error, not retrying");
                return Err(RetryError::Permanent(error));
            }
            Err(error) => {
                if attempt > policy.max_retries {
                    tracing::warn!(attempts = attempt, error = %error, "Retries exhausted");
                    return Err(RetryError::Exhausted {
                        error,
                        attempts: attempt,
                    });
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Transient upstream error, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn quota() -> UpstreamError {
        UpstreamError::rate_limited("429 Too Many Requests")
    }

    #[test]
    fn test_delay_schedule_clamps_to_last() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1));
        assert_eq!(policy.delay_for(3), Duration::from_secs(2));
        assert_eq!(policy.delay_for(7), Duration::from_secs(2));
        assert_eq!(RetryPolicy::none().delay_for(1), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_quota_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::default();
        let start = Instant::now();

        let counter = calls.clone();
        let result = call_with_backoff(&policy, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= 2 {
                    Err(quota())
                } else {
                    Ok("audio")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "audio");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 0.5s + 1s，恰好两次退避
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();

        let counter = calls.clone();
        let result: Result<(), _> = call_with_backoff(&RetryPolicy::default(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(UpstreamError::new(UpstreamErrorKind::Rejected, "API key not valid"))
            }
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_exhausted());
        assert_eq!(err.inner().kind, UpstreamErrorKind::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_keeps_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(2, vec![Duration::from_millis(100)]);
        let start = Instant::now();

        let counter = calls.clone();
        let result: Result<(), _> = call_with_backoff(&policy, || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Err(UpstreamError::rate_limited(format!("attempt {}", n)))
            }
        })
        .await;

        match result.unwrap_err() {
            RetryError::Exhausted { error, attempts } => {
                assert_eq!(attempts, 3);
                assert_eq!(error.message, "attempt 3");
                assert!(error.is_rate_limited());
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result = call_with_backoff(&RetryPolicy::default(), || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(UpstreamError::new(UpstreamErrorKind::Unavailable, "overloaded"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
