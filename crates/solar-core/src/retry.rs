//! Bounded retries with exponential backoff

use embassy_time::Duration;
use log::warn;
use thiserror_no_std::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound for a single attempt, applied by the caller.
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Association plus DHCP lease. Gives up after roughly two minutes.
    pub const WIFI_JOIN: Self = Self {
        max_attempts: 6,
        initial_backoff: Duration::from_millis(500),
        max_backoff: Duration::from_secs(8),
        attempt_timeout: Duration::from_secs(15),
    };

    /// Delay before retry number `attempt` (the first retry is attempt 1).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(31);
        let ticks = self
            .initial_backoff
            .as_ticks()
            .saturating_mul(1u64 << shift);
        Duration::from_ticks(ticks.min(self.max_backoff.as_ticks()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryError<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `op` until it succeeds or the policy's attempt cap is reached.
///
/// `op` receives the 1-based attempt number. `sleep` waits between
/// attempts; it is passed in so the caller picks the timer.
pub async fn run_with_retry<T, E, Op, OpFut, Sleep, SleepFut>(
    policy: &RetryPolicy,
    mut op: Op,
    mut sleep: Sleep,
) -> Result<T, RetryError<E>>
where
    E: core::fmt::Display,
    Op: FnMut(u32) -> OpFut,
    OpFut: Future<Output = Result<T, E>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= max_attempts => {
                return Err(RetryError {
                    attempts: attempt,
                    last: e,
                });
            }
            Err(e) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {} ms",
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
