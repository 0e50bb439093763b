//! Property tests for backoff policies.

use super::*;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #[test]
    fn prop_delay_doubles_each_attempt(base_ms in 1u64..10_000, n in 0u32..4) {
        let policy = BackoffPolicy::new(Duration::from_millis(base_ms), 5);
        prop_assert_eq!(policy.next_delay(n + 1), policy.next_delay(n) * 2);
        prop_assert_eq!(policy.next_delay(n), Duration::from_millis(base_ms << n));
    }

    #[test]
    fn prop_never_retries_past_cap(max in 1u32..20, extra in 0u32..1000) {
        let policy = BackoffPolicy::new(Duration::from_millis(1), max);
        prop_assert!(!policy.should_retry(OutcomeClass::Retryable, max + extra));
    }

    #[test]
    fn prop_never_retries_terminal(n in 0u32..10) {
        let policy = BackoffPolicy::default();
        prop_assert!(!policy.should_retry(OutcomeClass::Terminal, n));
    }

    #[test]
    fn prop_max_delay_caps_everything(cap_ms in 1u64..20_000, n in 0u32..5) {
        let policy = BackoffPolicy::default().with_max_delay(Duration::from_millis(cap_ms));
        prop_assert!(policy.next_delay(n) <= Duration::from_millis(cap_ms));
    }
}

#[test]
fn test_reference_table_matches_formula() {
    let policy = BackoffPolicy::default();
    for n in 0..DEFAULT_MAX_ATTEMPTS {
        assert_eq!(
            policy.next_delay(n),
            Duration::from_millis(1000 * 2u64.pow(n))
        );
    }
}
