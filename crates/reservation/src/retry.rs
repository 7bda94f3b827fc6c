use std::time::Duration;

/// Default number of attempts for one admission.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(10);
const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(200);

/// Bounded exponential backoff for transient contention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy with the default delays and the given attempt budget.
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Sets the backoff bounds.
    pub fn delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay.max(base_delay);
        self
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let backoff = self.base_delay.saturating_mul(1 << exp).min(self.max_delay);
        backoff + jitter(self.base_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

/// Up to one base delay of jitter, seeded from the clock.
fn jitter(base: Duration) -> Duration {
    let bound = base.as_micros() as u64;
    if bound == 0 {
        return Duration::ZERO;
    }
    let seed = u64::from(
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .subsec_nanos(),
    );
    Duration::from_micros(seed % bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(10) && first < Duration::from_millis(20));

        let third = policy.backoff(3);
        assert!(third >= Duration::from_millis(40) && third < Duration::from_millis(50));

        let late = policy.backoff(30);
        assert!(late >= Duration::from_millis(200) && late < Duration::from_millis(210));
    }

    #[test]
    fn zero_delays_never_sleep() {
        let policy = RetryPolicy::with_max_attempts(3).delays(Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.backoff(1), Duration::ZERO);
        assert_eq!(policy.backoff(5), Duration::ZERO);
    }

    #[test]
    fn at_least_one_attempt() {
        assert_eq!(RetryPolicy::with_max_attempts(0).max_attempts, 1);
    }
}
