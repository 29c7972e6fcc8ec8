//! Reconnection backoff and retry policy

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::RetryReason;

/// Strategy computing a reconnect delay in seconds from a retry count
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum Backoff {
    /// `factor^(count-1)` seconds, with proportional jitter
    Exponential { factor: f64, jitter: f64 },
    /// `factor * count` seconds, with proportional jitter
    Linear { factor: f64, jitter: f64 },
    /// Uniform in `[min, max]` seconds, with proportional jitter
    Random { min: f64, max: f64, jitter: f64 },
    /// Fixed delay in seconds
    Const { delay: f64 },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            factor: 2.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Delay in seconds for the `count`-th consecutive retry (1-based)
    pub fn next(&self, count: u32) -> f64 {
        let mut rng = rand::thread_rng();
        let (delay, jitter) = match self {
            Self::Exponential { factor, jitter } => (factor.powi(count as i32 - 1), *jitter),
            Self::Linear { factor, jitter } => (factor * f64::from(count), *jitter),
            Self::Random { min, max, jitter } => (min + rng.gen::<f64>() * (max - min), *jitter),
            Self::Const { delay } => (*delay, 0.0),
        };
        let jittered = delay + rng.gen_range(-1.0..=1.0) * jitter * delay;
        jittered.max(0.0)
    }
}

/// Predicate marking failure reasons that must not be retried
pub type SuppressFilter = Arc<dyn Fn(&RetryReason) -> bool + Send + Sync>;

/// Options for [`crate::Client::auto_retry`]
#[derive(Clone, Default)]
pub struct RetryOptions {
    /// Maximum number of consecutive retries; `None` means unlimited
    pub limit: Option<u32>,
    /// Delay strategy between attempts
    pub backoff: Backoff,
    /// When this returns `true` for a reason, the retry is suppressed
    /// and the session closes instead
    pub suppress: Option<SuppressFilter>,
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("limit", &self.limit)
            .field("backoff", &self.backoff)
            .field("suppress", &self.suppress.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Retry state for one session
#[derive(Debug)]
pub(crate) struct Retrier {
    options: RetryOptions,
    count: u32,
}

impl Retrier {
    pub(crate) fn new(options: RetryOptions) -> Self {
        Self { options, count: 0 }
    }

    /// Decide whether to retry after `reason`, returning the delay
    ///
    /// `None` means the session should give up and close.
    pub(crate) fn next_delay(&mut self, reason: &RetryReason) -> Option<Duration> {
        if let Some(suppress) = &self.options.suppress {
            if suppress(reason) {
                return None;
            }
        }
        if let Some(limit) = self.options.limit {
            if self.count >= limit {
                return None;
            }
        }
        self.count += 1;
        Some(Duration::from_secs_f64(self.options.backoff.next(self.count)))
    }

    /// Reset the attempt counter after a successful open
    pub(crate) fn reset(&mut self) {
        self.count = 0;
    }
}
