//! 重试策略：最大次数、指数退避（时间单位翻倍，封顶）、可重试错误谓词
//!
//! 外部调用包装器（Fetcher、DecisionClient）各自持有一份策略，而不是在调用点零散地写重试。

use std::future::Future;
use std::time::Duration;

/// 指数退避重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

/// 重试耗尽（或遇到不可重试错误）时返回最后一次错误与已尝试次数
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure<E> {
    pub error: E,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }

    /// 数据拉取：最多 3 次
    pub fn fetch(base_delay: Duration, max_delay: Duration) -> Self {
        Self::new(3, base_delay, max_delay)
    }

    /// 决策服务：最多 2 次
    pub fn oracle(base_delay: Duration, max_delay: Duration) -> Self {
        Self::new(2, base_delay, max_delay)
    }

    /// 第 attempt 次失败后、下一次尝试前的等待：base * 2^(attempt-1)，不超过 max_delay
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let factor = 1u32 << exp;
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// 执行异步操作；is_retryable 为 false 的错误立即返回
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, is_retryable: P) -> Result<T, RetryFailure<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts || !is_retryable(&error) {
                        return Err(RetryFailure { error, attempts: attempt });
                    }
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
