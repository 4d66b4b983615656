//! Per-object retry bookkeeping for transient pass failures.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Default backoff after the first failure.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(5);

/// Default backoff ceiling.
pub const DEFAULT_RETRY_MAX: Duration = Duration::from_secs(300);

/// Default retry limit per object within one window.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default retry window.
pub const DEFAULT_RETRY_WINDOW: Duration = Duration::from_secs(600);

/// Backoff and give-up parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
    pub max_retries: u32,
    pub window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: DEFAULT_RETRY_BASE,
            max: DEFAULT_RETRY_MAX,
            max_retries: DEFAULT_MAX_RETRIES,
            window: DEFAULT_RETRY_WINDOW,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt (1-based): `base * 2^(attempt-1)`,
    /// capped at `max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        self.base
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }
}

/// Tracks consecutive failures per object key.
///
/// A key's count resets once its first failure falls outside the window, or
/// when [`RetryTracker::clear`] is called after a successful pass.
#[derive(Debug)]
pub struct RetryTracker {
    policy: RetryPolicy,

    /// Tracked failures: object key -> (count, first failure time).
    failures: BTreeMap<String, (u32, Instant)>,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Record a failure for `key`.
    ///
    /// Returns the delay before the next attempt, or `None` once retries are
    /// exhausted for the current window.
    pub fn record_failure(&mut self, key: &str) -> Option<Duration> {
        self.record_failure_at(key, Instant::now())
    }

    fn record_failure_at(&mut self, key: &str, now: Instant) -> Option<Duration> {
        let (count, first) = self.failures.entry(key.to_string()).or_insert((0, now));

        // A stale window starts over.
        if now.duration_since(*first) > self.policy.window {
            *count = 0;
            *first = now;
        }

        *count += 1;
        if *count > self.policy.max_retries {
            None
        } else {
            Some(self.policy.backoff(*count))
        }
    }

    /// Failures recorded for `key` in the current window.
    pub fn attempts(&self, key: &str) -> u32 {
        self.failures.get(key).map_or(0, |(count, _)| *count)
    }

    /// Whether `key` has used up its retries in the current window.
    pub fn is_exhausted(&self, key: &str) -> bool {
        let Some((count, first)) = self.failures.get(key) else {
            return false;
        };
        if Instant::now().duration_since(*first) > self.policy.window {
            return false;
        }
        *count > self.policy.max_retries
    }

    /// Forget `key` after a successful pass.
    pub fn clear(&mut self, key: &str) {
        self.failures.remove(key);
    }

    /// Drop keys whose window has passed.
    pub fn prune(&mut self) {
        let now = Instant::now();
        let window = self.policy.window;
        self.failures
            .retain(|_, (_, first)| now.duration_since(*first) <= window);
    }
}
