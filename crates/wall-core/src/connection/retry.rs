//! Reconnect delay policies.
//!
//! The manager never sleeps on its own; when a transport is lost it asks a
//! [`RetryPolicy`] how long to wait and hands that duration to whoever drives
//! the timer.  `attempt` counts consecutive losses since the last successful
//! open and starts at 1.

use std::time::Duration;

/// Default reconnect delay used by the wall's control panel.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Decides how long to wait before the next connect attempt.
#[cfg_attr(test, mockall::automock)]
pub trait RetryPolicy: Send {
    /// Delay before reconnect attempt number `attempt` (1-based).
    fn next_retry_delay(&self, attempt: u32) -> Duration;
}

/// Same delay every time, forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedDelay(pub Duration);

impl Default for FixedDelay {
    fn default() -> Self {
        Self(DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy for FixedDelay {
    fn next_retry_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// Doubles (or multiplies by `factor`) the delay after each consecutive
/// failure, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
        }
    }
}

impl RetryPolicy for ExponentialBackoff {
    fn next_retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let scaled = self.initial.as_secs_f64() * self.factor.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn next_retry_delay(&self, attempt: u32) -> Duration {
        (**self).next_retry_delay(attempt)
    }
}
