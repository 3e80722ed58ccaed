use std::time::Duration;

/// Delay schedule between bounded retry attempts. The attempt count itself
/// is owned by the caller; this only answers "how long before attempt N+1".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// Retry immediately.
    None,
    /// Constant delay between attempts.
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped.
    Exponential { base: Duration, cap: Duration },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicy::Exponential {
            base: Duration::from_millis(200),
            cap: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    /// Delay to apply after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::None => Duration::ZERO,
            BackoffPolicy::Fixed(delay) => *delay,
            BackoffPolicy::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                (*base).checked_mul(factor).map_or(*cap, |d| d.min(*cap))
            }
        }
    }
}
