//! 执行重试策略（RetryStrategy）
//!
//! 在瞬时基础设施故障（连接中断、死锁牺牲者等）时从头重新执行整个暂存块，
//! 重试次数有上限，两次尝试之间按封顶的指数或固定退避等待；
//! 非瞬时错误（校验、未找到、参数错误、永久持久化错误）首次出现即原样返回。
//!
use crate::error::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    #[default]
    Exponential,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryStrategy {
    /// 最大重试次数（不含首次执行）
    pub max_retry_count: usize,
    pub base_delay: Duration,
    pub max_retry_delay: Duration,
    pub backoff: Backoff,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retry_count: 10,
            base_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
            backoff: Backoff::Exponential,
        }
    }
}

impl RetryStrategy {
    /// 不重试：瞬时故障首次出现即视为致命
    pub fn none() -> Self {
        Self {
            max_retry_count: 0,
            ..Self::default()
        }
    }

    pub fn fixed(max_retry_count: usize, delay: Duration) -> Self {
        Self {
            max_retry_count,
            base_delay: delay,
            max_retry_delay: delay,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_retry_count: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retry_count,
            base_delay,
            max_retry_delay: max_delay.max(base_delay),
            backoff: Backoff::Exponential,
        }
    }

    /// 第 `attempt` 次失败后的等待时长（attempt 从 1 开始）
    pub fn delay_for(&self, attempt: usize) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay.min(self.max_retry_delay),
            Backoff::Exponential => {
                let cap = self.max_retry_delay.max(self.base_delay);
                let mut delay = self.base_delay;
                for _ in 1..attempt {
                    delay = delay.saturating_mul(2).min(cap);
                }
                delay
            }
        }
    }

    /// 在重试策略下执行操作；`op` 接收当前尝试序号（从 1 开始）
    pub async fn execute<T, F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> DomainResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let max_attempts = self.max_retry_count + 1;
        let mut attempt = 1usize;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if attempt >= max_attempts {
                        return Err(DomainError::RetriesExhausted {
                            attempts: attempt,
                            reason: err.to_string(),
                        });
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(DomainError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn exponential_backoff_is_capped() {
        let s = RetryStrategy::exponential(5, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(s.delay_for(1), Duration::from_millis(100));
        assert_eq!(s.delay_for(2), Duration::from_millis(200));
        assert_eq!(s.delay_for(3), Duration::from_millis(400));
        assert_eq!(s.delay_for(4), Duration::from_millis(500));
        assert_eq!(s.delay_for(9), Duration::from_millis(500));
    }

    #[test]
    fn fixed_backoff() {
        let s = RetryStrategy::fixed(3, Duration::from_millis(50));
        assert_eq!(s.delay_for(1), s.delay_for(3));
    }

    #[tokio::test]
    async fn transient_then_success() {
        let s = RetryStrategy::fixed(3, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);
        let out = s
            .execute(&CancellationToken::new(), |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(DomainError::transient("connection reset"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_become_fatal() {
        let s = RetryStrategy::fixed(2, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);
        let err = s
            .execute(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DomainError::transient("deadlock victim")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::RetriesExhausted { attempts: 3, .. }));
        assert!(err.is_persistence());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let s = RetryStrategy::fixed(5, Duration::from_millis(1));
        let calls = AtomicUsize::new(0);
        let err = s
            .execute(&CancellationToken::new(), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(DomainError::persistence("unique violation")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Persistence { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let s = RetryStrategy::fixed(5, Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let err = s
            .execute(&token, |_| async {
                Err::<(), _>(DomainError::transient("connection reset"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Cancelled));
    }
}
