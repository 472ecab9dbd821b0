//! Property tests for backoff delays.
//!
//! Invariants tested:
//! - Exponential delays never exceed max_delay under any jitter mode
//! - max_delay has no effect on fixed, linear or Fibonacci delays
//! - Unjittered delays never shrink as the retry number grows

use proptest::prelude::*;
use safeguard_retry::{Backoff, BackoffStrategy, Jitter};
use std::time::Duration;

fn strategy() -> impl Strategy<Value = BackoffStrategy> {
    prop_oneof![
        Just(BackoffStrategy::Fixed),
        Just(BackoffStrategy::Linear),
        Just(BackoffStrategy::Exponential),
        Just(BackoffStrategy::Fibonacci),
    ]
}

fn jitter() -> impl Strategy<Value = Jitter> {
    prop_oneof![Just(Jitter::None), Just(Jitter::Full), Just(Jitter::Equal)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn exponential_delay_never_exceeds_max_delay(
        jitter in jitter(),
        initial_ms in 0u64..=5_000,
        extra_ms in 0u64..=60_000,
        factor in 1.0f64..=10.0,
        retry in 1u32..=200,
    ) {
        let max_delay = Duration::from_millis(initial_ms + extra_ms);
        let backoff = Backoff::new(BackoffStrategy::Exponential, Duration::from_millis(initial_ms))
            .backoff_factor(factor)
            .max_delay(max_delay)
            .jitter(jitter);

        let delay = backoff.delay_for(retry);
        prop_assert!(
            delay <= max_delay,
            "retry {} waited {:?}, cap {:?}",
            retry,
            delay,
            max_delay
        );
    }

    #[test]
    fn uncapped_strategies_ignore_max_delay(
        strategy in prop_oneof![
            Just(BackoffStrategy::Fixed),
            Just(BackoffStrategy::Linear),
            Just(BackoffStrategy::Fibonacci),
        ],
        initial_ms in 1u64..=5_000,
        max_ms in 0u64..=1_000,
        retry in 1u32..=30,
    ) {
        let uncapped = Backoff::new(strategy, Duration::from_millis(initial_ms))
            .max_delay(Duration::MAX);
        let capped = uncapped.clone().max_delay(Duration::from_millis(max_ms));
        prop_assert_eq!(capped.base_delay(retry), uncapped.base_delay(retry));
    }

    #[test]
    fn unjittered_delays_are_monotonic(
        strategy in strategy(),
        initial_ms in 1u64..=1_000,
        factor in 1.0f64..=4.0,
        retries in 2u32..=40,
    ) {
        let backoff = Backoff::new(strategy, Duration::from_millis(initial_ms))
            .backoff_factor(factor)
            .max_delay(Duration::from_secs(120));

        let delays: Vec<_> = (1..=retries).map(|n| backoff.base_delay(n)).collect();
        prop_assert!(delays.windows(2).all(|pair| pair[0] <= pair[1]), "{:?}", delays);
    }
}
