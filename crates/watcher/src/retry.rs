use crate::error::WatcherError;
use futures::future::try_join_all;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const INITIAL_RETRY_DELAY_MS: u64 = 1_000;
pub const MAX_RETRY_DELAY_MS: u64 = 60_000;
pub const MAX_BATCH_SIZE: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failures` consecutive failures
    /// (1-based): `min(initial * 2^(failures-1), max)`.
    pub fn delay_after(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(31);
        self.initial_delay
            .checked_mul(1u32 << exponent)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Heights to fetch in one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchHeights {
    Explicit(Vec<u64>),
    /// `count` heights starting at `start`, never past `head`.
    Range { start: u64, count: u64, head: u64 },
}

impl BatchHeights {
    pub fn resolve(&self) -> Vec<u64> {
        match self {
            BatchHeights::Explicit(heights) => {
                let mut heights = heights.clone();
                heights.sort_unstable();
                heights.dedup();
                heights
            }
            BatchHeights::Range { start, count, head } => {
                if *count == 0 || start > head {
                    return Vec::new();
                }
                let end = start.saturating_add(count - 1).min(*head);
                (*start..=end).collect()
            }
        }
    }
}

/// Runs fetches until they succeed. Failures are logged and retried with
/// capped exponential backoff; the only way out without a value is
/// cancellation.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run<T, F, Fut>(&self, label: &str, mut fetch: F) -> Result<T, WatcherError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut failures = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(WatcherError::Cancelled);
            }

            match fetch().await {
                Ok(value) => {
                    if failures > 0 {
                        debug!("{} succeeded after {} retries", label, failures);
                    }
                    return Ok(value);
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    let delay = self.policy.delay_after(failures);
                    warn!(
                        "{} failed (attempt {}), retrying in {}ms: {:#}",
                        label,
                        failures,
                        delay.as_millis(),
                        e
                    );

                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(WatcherError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Fetches every height concurrently, each under its own retry loop.
    /// Results come back ordered by height regardless of completion order.
    pub async fn run_batch<T, F, Fut>(
        &self,
        label: &str,
        heights: &BatchHeights,
        fetch: F,
    ) -> Result<Vec<(u64, T)>, WatcherError>
    where
        F: Fn(u64) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let fetch = &fetch;
        let units = heights.resolve().into_iter().map(|height| async move {
            let label = format!("{} at height {}", label, height);
            let value = self.run(&label, || fetch(height)).await?;
            Ok::<_, WatcherError>((height, value))
        });

        let mut results = try_join_all(units).await?;
        results.sort_by_key(|(height, _)| *height);
        Ok(results)
    }
}
