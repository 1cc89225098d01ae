use std::future::Future;
use std::time::Duration;

use common::config::RetryConfig;
use tokio::time::sleep;
use tracing::warn;

const MAX_DOUBLINGS: u32 = 8;

/// Retry schedule for snapshot I/O. The pipeline core never retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub jitter_frac: f32,
    pub max_attempts: u32,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_ms),
            max: Duration::from_millis(config.max_ms),
            jitter_frac: config.jitter_frac,
            max_attempts: config.max_attempts.max(1),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): `base` doubled per
    /// attempt, capped at `max`, then spread by up to `jitter_frac` either way.
    pub fn delay(&self, attempt: u32) -> Duration {
        let doublings = attempt.saturating_sub(1).min(MAX_DOUBLINGS);
        let capped = self.base.saturating_mul(1 << doublings).min(self.max);
        let millis = capped.as_millis() as f64;
        let spread = millis * f64::from(self.jitter_frac.clamp(0.0, 1.0));
        let jittered = millis + spread * (fastrand::f64() * 2.0 - 1.0);
        Duration::from_millis(jittered.max(0.0).round() as u64)
    }

    /// Runs `op` until it succeeds or the attempt budget is spent, returning
    /// the last error.
    pub async fn retry<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts => {
                    let delay = self.delay(attempt);
                    warn!(
                        what,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
