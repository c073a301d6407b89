use std::time::Duration;

/// Delay schedule for retried calls.
///
/// The n-th delay is `initial * factor^n`, capped at `max`. A factor of 1.0
/// gives a fixed interval.
#[derive(Clone, Debug, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Backoff {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            factor: 1.0,
            max: interval,
        }
    }

    pub fn exponential(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            factor: 2.0,
            max,
        }
    }

    /// Delay to wait after the `attempt`-th failure (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial.as_secs_f64() * self.factor.max(1.0).powi(exponent);
        let max = self.max.max(self.initial);
        if !secs.is_finite() || secs >= max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}
