//! Retry-to-dead-letter boundary for background jobs.
//!
//! This is the only place in the system allowed to swallow an error, and
//! only after persisting it as a dead letter. Everything below this
//! boundary raises so the backoff here can actually engage.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{error, info, warn};

use pulsewire_common::{DeadLetterStore, MetricsSink};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Adds up to one second of uniform jitter to each backoff sleep.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Backoff before the retry following `attempt` (1-based):
    /// `min(base * 2^(attempt-1), max)`. Pure; jitter is applied at the
    /// sleep site.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    fn sleep_duration(&self, attempt: u32) -> Duration {
        let base = self.delay_for(attempt);
        if self.jitter {
            base + Duration::from_millis(rand::rng().random_range(0..1000))
        } else {
            base
        }
    }
}

/// Run a background job with exponential-backoff retries.
///
/// On success at any attempt the result is returned and a success metric
/// recorded. When the budget is exhausted the error is persisted as a
/// dead letter (job name, error, full chain, attempt count), a failure
/// metric is recorded, and `None` is returned; the error does not
/// propagate further.
pub async fn run_job<T, F, Fut>(
    name: &str,
    policy: &RetryPolicy,
    dead_letters: &dyn DeadLetterStore,
    metrics: &dyn MetricsSink,
    mut job: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let started = Instant::now();

    let mut attempt = 1;
    loop {
        match job().await {
            Ok(result) => {
                let duration = started.elapsed();
                metrics.job_succeeded(name, duration);
                info!(job = name, attempt, duration_ms = duration.as_millis() as u64, "Job succeeded");
                return Some(result);
            }
            Err(e) if attempt < max_attempts => {
                let delay = policy.sleep_duration(attempt);
                warn!(
                    job = name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Job failed, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                let duration = started.elapsed();
                metrics.job_failed(name, duration);
                error!(
                    job = name,
                    attempts = attempt,
                    duration_ms = duration.as_millis() as u64,
                    error = %e,
                    "Job exhausted retries, writing dead letter"
                );
                let trace = format!("{e:?}");
                if let Err(insert_err) = dead_letters
                    .insert(name, &e.to_string(), &trace, attempt)
                    .await
                {
                    // The dead letter is the durable record; losing it is
                    // worth an error-level line, but never a panic.
                    error!(job = name, error = %insert_err, "Failed to persist dead letter");
                }
                return None;
            }
        }
    }
}
