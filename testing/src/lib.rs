//! # Composable Rest Testing
//!
//! Testing utilities and helpers for reducer-driven REST resource state.
//!
//! This crate provides:
//! - Mock implementations of Environment traits
//! - Test helpers for driving effects without a store
//! - Property-based testing strategies for JSON payloads
//! - Assertion helpers for reducers
//!
//! ## Example
//!
//! ```ignore
//! use composable_rest_testing::{test_clock, ReducerTest};
//!
//! ReducerTest::new(RestReducer::list())
//!     .with_env(test_environment())
//!     .given_state(RestState::default())
//!     .when_action(RestAction::SetItems(vec![json!({"id": 1})]))
//!     .then_state(|state| assert!(state.is_initialized()))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use composable_rest_core::environment::Clock;


/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_rest_testing::mocks::FixedClock;
    /// use composable_rest_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use composable_rest_core::effect::Effect;
    use futures::future::BoxFuture;

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Safe to call from every test; only the first call installs anything.
    /// Honors `RUST_LOG`, defaulting to `warn`.
    pub fn init_test_tracing() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }

    /// Drive an effect to completion outside of a store
    ///
    /// Returns the actions the effect fed back, in completion order for
    /// sequential effects and in declaration order for parallel ones.
    pub async fn run_effect<A: Send + 'static>(effect: Effect<A>) -> Vec<A> {
        collect(effect).await
    }

    fn collect<A: Send + 'static>(effect: Effect<A>) -> BoxFuture<'static, Vec<A>> {
        Box::pin(async move {
            match effect {
                Effect::None => Vec::new(),
                Effect::Future(fut) => fut.await.into_iter().collect(),
                Effect::Parallel(effects) => {
                    futures::future::join_all(effects.into_iter().map(collect))
                        .await
                        .into_iter()
                        .flatten()
                        .collect()
                },
                Effect::Sequential(effects) => {
                    let mut actions = Vec::new();
                    for effect in effects {
                        actions.extend(collect(effect).await);
                    }
                    actions
                },
            }
        })
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Map, Value};

    /// Scalar JSON values (null, bool, integer, short string)
    pub fn json_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "[a-z]{0,8}".prop_map(Value::String),
        ]
    }

    /// Arbitrary JSON values up to a small nesting depth
    pub fn json_value() -> impl Strategy<Value = Value> {
        json_scalar().prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    /// JSON objects keyed by `key` with distinct integer identifiers
    ///
    /// Every generated item carries `key` plus a `name` field.
    pub fn keyed_items(key: &'static str, max_len: usize) -> impl Strategy<Value = Vec<Value>> {
        prop::collection::btree_set(0i64..1_000, 0..=max_len).prop_map(move |ids| {
            ids.into_iter()
                .map(|id| {
                    let mut item = Map::new();
                    item.insert(key.to_owned(), Value::from(id));
                    item.insert("name".to_owned(), Value::String(format!("item-{id}")));
                    Value::Object(item)
                })
                .collect()
        })
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{assertions, ReducerTest};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use composable_rest_core::effect::Effect;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[tokio::test]
    async fn run_effect_collects_fed_back_actions() {
        let effect: Effect<u8> = Effect::chain(vec![
            Effect::Future(Box::pin(async { Some(1) })),
            Effect::None,
            Effect::merge(vec![
                Effect::Future(Box::pin(async { Some(2) })),
                Effect::fire_and_forget(async {}),
                Effect::Future(Box::pin(async { Some(3) })),
            ]),
        ]);

        assert_eq!(helpers::run_effect(effect).await, vec![1, 2, 3]);
    }

    proptest::proptest! {
        #[test]
        fn keyed_items_have_unique_keys(items in properties::keyed_items("id", 8)) {
            let mut ids: Vec<i64> = items.iter().map(|item| item["id"].as_i64().unwrap()).collect();
            let before = ids.len();
            ids.dedup();
            proptest::prop_assert_eq!(ids.len(), before);
        }
    }
}
