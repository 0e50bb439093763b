//! Backoff policy types and configuration.

use std::time::Duration;

use serde::Deserialize;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Default attempt cap, including the first attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How an attempt's outcome bears on retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeClass {
    /// The attempt produced generated text.
    Success,
    /// Transient failure (rate limit, server error, network).
    Retryable,
    /// Client error or malformed response.
    Terminal,
}

/// Exponential backoff between attempts of one session.
///
/// Policies are pure data: `next_delay` and `should_retry` perform no I/O,
/// so the retry loop can be tested without waiting in real time.
///
/// Delay for attempt `n` is `base * 2^n`. With the defaults
/// (1000ms, 5 attempts) indices 0..=4 give 1000, 2000, 4000, 8000 and
/// 16000 ms.
///
/// # Examples
///
/// ```rust
/// use promptline::retry::{BackoffPolicy, OutcomeClass};
/// use std::time::Duration;
///
/// let policy = BackoffPolicy::default();
///
/// assert_eq!(policy.next_delay(0), Duration::from_millis(1000));
/// assert_eq!(policy.next_delay(4), Duration::from_millis(16000));
/// assert!(policy.should_retry(OutcomeClass::Retryable, 4));
/// assert!(!policy.should_retry(OutcomeClass::Retryable, 5));
/// assert!(!policy.should_retry(OutcomeClass::Terminal, 1));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    base: Duration,
    max_attempts: u32,
    max_delay: Option<Duration>,
    jitter: JitterStrategy,
}

/// Strategy for adding randomness to delays.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JitterStrategy {
    /// No jitter applied.
    #[default]
    None,
    /// Add ±percentage randomness to delay.
    Proportional(f64),
    /// Random delay between 0 and calculated delay.
    Full,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS)
    }
}

impl BackoffPolicy {
    /// Create a policy with the given base delay and attempt cap.
    ///
    /// `max_attempts` counts the first attempt, and is raised to 1 if zero.
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts: max_attempts.max(1),
            max_delay: None,
            jitter: JitterStrategy::None,
        }
    }

    /// Cap every delay at `d`.
    ///
    /// ```rust
    /// use promptline::retry::BackoffPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = BackoffPolicy::default().with_max_delay(Duration::from_secs(5));
    /// assert_eq!(policy.next_delay(2), Duration::from_secs(4));
    /// assert_eq!(policy.next_delay(3), Duration::from_secs(5));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Add proportional jitter (`0.25` means ±25%).
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are unchanged.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = JitterStrategy::Proportional(factor.clamp(0.0, 1.0));
        self
    }

    /// Use full jitter: a random delay between 0 and the calculated delay.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, delays are unchanged.
    pub fn with_full_jitter(mut self) -> Self {
        self.jitter = JitterStrategy::Full;
        self
    }

    /// Base delay.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Attempt cap, including the first attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay cap, if any.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Jitter strategy.
    pub fn jitter(&self) -> &JitterStrategy {
        &self.jitter
    }

    /// Deterministic delay to wait after attempt `attempt_index` fails.
    ///
    /// Defined for every index. Indices at or past `max_attempts` are never
    /// slept on by the orchestrator. The doubling factor saturates at
    /// `u32::MAX`, so very large indices never overflow.
    pub fn next_delay(&self, attempt_index: u32) -> Duration {
        let delay = self
            .base
            .saturating_mul(2u32.saturating_pow(attempt_index));
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Delay with the configured jitter applied.
    pub fn jittered_delay(&self, attempt_index: u32) -> Duration {
        self.jitter
            .apply(self.next_delay(attempt_index), self.max_delay)
    }

    /// Whether attempt `attempt_index` may run after an outcome of `class`.
    ///
    /// False once `attempt_index >= max_attempts`, and false for any
    /// non-retryable class regardless of the index.
    pub fn should_retry(&self, class: OutcomeClass, attempt_index: u32) -> bool {
        class == OutcomeClass::Retryable && attempt_index < self.max_attempts
    }
}

impl JitterStrategy {
    /// Apply jitter to a base delay, keeping the result under `max_delay`.
    pub fn apply(&self, base_delay: Duration, max_delay: Option<Duration>) -> Duration {
        let jittered = match self {
            JitterStrategy::None => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Proportional(factor) => {
                use rand::Rng;
                let base_millis = base_delay.as_millis() as f64;
                let jitter_range = base_millis * factor;
                let min = (base_millis - jitter_range).max(0.0);
                let max = base_millis + jitter_range;
                Duration::from_millis(rand::rng().random_range(min..=max) as u64)
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Proportional(_) => base_delay,
            #[cfg(feature = "jitter")]
            JitterStrategy::Full => {
                use rand::Rng;
                let max_millis = base_delay.as_millis() as u64;
                if max_millis == 0 {
                    Duration::ZERO
                } else {
                    Duration::from_millis(rand::rng().random_range(0..=max_millis))
                }
            }
            #[cfg(not(feature = "jitter"))]
            JitterStrategy::Full => base_delay,
        };

        match max_delay {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}

/// `[backoff]` table of the client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BackoffSettings {
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Attempt cap, including the first attempt.
    pub max_attempts: u32,
    /// Optional delay cap, in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_BASE_DELAY.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_delay_ms: None,
        }
    }
}

impl From<&BackoffSettings> for BackoffPolicy {
    fn from(settings: &BackoffSettings) -> Self {
        let policy = BackoffPolicy::new(
            Duration::from_millis(settings.base_delay_ms),
            settings.max_attempts,
        );
        match settings.max_delay_ms {
            Some(ms) => policy.with_max_delay(Duration::from_millis(ms)),
            None => policy,
        }
    }
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    #[test]
    fn test_reference_delays() {
        let policy = BackoffPolicy::default();
        let delays: Vec<u128> = (0..5).map(|n| policy.next_delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000]);
    }

    #[test]
    fn test_indices_past_cap_saturate() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.next_delay(5), Duration::from_millis(32000));
        assert_eq!(
            policy.next_delay(u32::MAX),
            Duration::from_secs(u64::from(u32::MAX))
        );

        let capped = policy.with_max_delay(Duration::from_secs(30));
        assert_eq!(capped.next_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry_stops_at_cap() {
        let policy = BackoffPolicy::default();
        for n in 0..5 {
            assert!(policy.should_retry(OutcomeClass::Retryable, n));
        }
        assert!(!policy.should_retry(OutcomeClass::Retryable, 5));
        assert!(!policy.should_retry(OutcomeClass::Retryable, u32::MAX));
    }

    #[test]
    fn test_terminal_and_success_never_retry() {
        let policy = BackoffPolicy::default();
        for n in 0..5 {
            assert!(!policy.should_retry(OutcomeClass::Terminal, n));
            assert!(!policy.should_retry(OutcomeClass::Success, n));
        }
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        let policy = BackoffPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(!policy.should_retry(OutcomeClass::Retryable, 1));
    }

    #[test]
    fn test_settings_round_into_policy() {
        let settings = BackoffSettings {
            base_delay_ms: 250,
            max_attempts: 3,
            max_delay_ms: Some(400),
        };
        let policy = BackoffPolicy::from(&settings);
        assert_eq!(policy.next_delay(0), Duration::from_millis(250));
        assert_eq!(policy.next_delay(2), Duration::from_millis(400));
        assert_eq!(policy.max_attempts(), 3);
    }

    #[test]
    fn test_no_jitter_is_identity() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.jittered_delay(3), policy.next_delay(3));
    }

    #[cfg(feature = "jitter")]
    #[test]
    fn test_proportional_jitter_stays_in_range() {
        let policy = BackoffPolicy::default().with_jitter(0.25);
        for _ in 0..50 {
            let d = policy.jittered_delay(1).as_millis();
            assert!((1500..=2500).contains(&d), "delay {d} out of range");
        }
    }

    #[cfg(feature = "jitter")]
    #[test]
    fn test_full_jitter_never_exceeds_base() {
        let policy = BackoffPolicy::default().with_full_jitter();
        for _ in 0..50 {
            assert!(policy.jittered_delay(2) <= Duration::from_millis(4000));
        }
    }
}
