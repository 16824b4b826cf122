//! Watch retry policy.

use std::time::Duration;

use crate::core::constants;

/// Shortest delay any policy will produce.
const MIN_DELAY: Duration = Duration::from_millis(1);

/// Delay between a failed watch request and the next attempt.
///
/// Policies never give up; a watch retries until it is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay after every failure.
    Fixed(Duration),
    /// Doubles after each consecutive failure, capped at `max`; back to
    /// `initial` after a success.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed(delay.max(MIN_DELAY))
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_DELAY);
        Self::Exponential {
            initial,
            max: max.max(initial),
        }
    }

    /// Per-watch delay sequence.
    pub(crate) fn delays(self) -> Delays {
        Delays {
            policy: self,
            failures: 0,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Fixed(constants::WATCH_BACKOFF)
    }
}

/// Mutable retry state owned by a single watch task.
#[derive(Debug)]
pub(crate) struct Delays {
    policy: Backoff,
    failures: u32,
}

impl Delays {
    /// Delay to sleep after the next failure.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = match self.policy {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { initial, max } => {
                let factor = 1u32.checked_shl(self.failures.min(31)).unwrap_or(u32::MAX);
                initial.saturating_mul(factor).min(max)
            }
        };
        self.failures = self.failures.saturating_add(1);
        delay.max(MIN_DELAY)
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
    }
}
