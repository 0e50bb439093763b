//! Backoff between attempts of a session.
//!
//! The policy is pure data, in the spirit of "pure core, imperative shell":
//!
//! - **Pure**: [`BackoffPolicy`] maps an attempt index to a delay and decides
//!   whether another attempt may run. No clocks, no I/O.
//! - **Deterministic**: without jitter the same index always gives the same
//!   delay, so retry timing can be asserted exactly in tests.
//! - **Bounded**: attempts are capped; there is no unbounded retry.
//!
//! # Quick Start
//!
//! ```rust
//! use promptline::retry::{BackoffPolicy, OutcomeClass};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new(Duration::from_millis(100), 3);
//!
//! assert_eq!(policy.next_delay(1), Duration::from_millis(200));
//! assert!(policy.should_retry(OutcomeClass::Retryable, 2));
//! assert!(!policy.should_retry(OutcomeClass::Retryable, 3));
//! ```
//!
//! # Jitter Support
//!
//! Enable the `jitter` feature to spread delays randomly:
//!
//! ```toml
//! promptline = { version = "...", features = ["jitter"] }
//! ```
//!
//! ```rust,ignore
//! let policy = BackoffPolicy::default().with_jitter(0.25);
//! ```

mod policy;

pub use policy::{
    BackoffPolicy, BackoffSettings, JitterStrategy, OutcomeClass, DEFAULT_BASE_DELAY,
    DEFAULT_MAX_ATTEMPTS,
};

#[cfg(test)]
mod tests;
