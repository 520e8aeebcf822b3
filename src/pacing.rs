//! Request pacing and retry backoff.
//!
//! Every delay is drawn at random from a range anchored at `min_delay` so
//! that requests never fall into a fixed rhythm:
//!
//! ```text
//! between requests / items : [min_delay, 3 * min_delay]
//! after failed attempt k   : [min_delay, (3 + k) * min_delay]
//! ```
//!
//! The backoff range therefore starts at `[min, 4*min]` after the first
//! failure and widens by one `min_delay` per further failure.

use rand::{rng, Rng};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Upper bound multiplier of the pacing range.
pub const PACING_SPREAD: f64 = 3.0;

/// Largest `min_delay` or timeout accepted from configuration.
pub const MAX_DELAY: Duration = Duration::from_secs(3600);

/// `secs` as a duration, clamped to `Duration::MAX`.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Random duration in `[min, min * factor]`.
pub fn jitter(min: Duration, factor: f64) -> Duration {
    let lo = min.as_secs_f64();
    let hi = (lo * factor).min(Duration::MAX.as_secs_f64());
    if hi <= lo {
        return min;
    }
    saturating_secs(rng().random_range(lo..=hi))
}

/// Pacing state of one crawl session.
#[derive(Debug, Clone)]
pub struct Pacer {
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl Pacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    #[cfg(test)]
    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }

    /// Record that a request was just sent.
    pub fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }

    /// Wait until a random gap has passed since the last request.
    ///
    /// Returns immediately before the first request of a session.
    pub async fn wait(&mut self) {
        let Some(last) = self.last_request else {
            return;
        };
        let gap = jitter(self.min_delay, PACING_SPREAD);
        let elapsed = last.elapsed();
        if gap > elapsed {
            let remaining = gap - elapsed;
            debug!(?remaining, "pacing before next request");
            sleep(remaining).await;
        }
    }

    /// Sleep a full random pacing delay regardless of when the last request
    /// was made.
    pub async fn pause(&self) {
        let delay = jitter(self.min_delay, PACING_SPREAD);
        if !delay.is_zero() {
            debug!(?delay, "pausing between items");
            sleep(delay).await;
        }
    }
}

/// Bounded retry policy with a widening random backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first one.
    pub max_retries: u32,
    pub min_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, min_delay: Duration) -> Self {
        Self {
            max_retries,
            min_delay,
        }
    }

    /// Upper bound of the backoff range after failed attempt `attempt`
    /// (1-based).
    pub fn backoff_ceiling(&self, attempt: u32) -> Duration {
        saturating_secs(self.min_delay.as_secs_f64() * (PACING_SPREAD + attempt as f64))
    }

    /// Random backoff after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        jitter(self.min_delay, PACING_SPREAD + attempt as f64)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}
