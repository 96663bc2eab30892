//! # Composable Rest Runtime
//!
//! Runtime implementation for reducer-driven resource state.
//!
//! This crate provides the [`Store`] that owns a state value, runs the
//! reducer for every action, and executes the effects the reducer returns.
//!
//! ## Core Components
//!
//! - **Store**: The runtime that manages state and executes effects
//! - **Effect Handle**: Lets a caller wait until the effects of one action are done
//! - **Action Broadcast**: Lets observers (UI adapters) react to every transition
//!
//! ## Example
//!
//! ```ignore
//! use composable_rest_runtime::Store;
//!
//! let store = Store::new(initial_state, my_reducer, environment);
//!
//! // Send an action and wait for its effects
//! let mut handle = store.send(Action::DoSomething).await?;
//! handle.wait().await;
//!
//! // Read state
//! let value = store.state(|s| s.some_field).await;
//! ```

use composable_rest_core::{effect::Effect, reducer::Reducer};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for effects of an action to complete
        #[error("Timeout waiting for effects")]
        Timeout,
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects started by
/// that action. Actions fed back into the store by those effects get their
/// own handles and are not tracked here.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // All effects from Action::Start are now complete
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle together with its internal tracking side
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running for this action
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // Every tracker is gone, so nothing can still be running
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            let _ = self.notifier.send(());
        }
    }
}

/// Internal: RAII guard that decrements effect counters on drop
///
/// Ensures both the per-action and the store-wide counters are updated,
/// even if the effect panics.
struct DecrementGuard {
    tracking: EffectTracking,
    pending: Arc<AtomicUsize>,
}

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.tracking.decrement();
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Boxed future used for recursive effect execution
type EffectFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Store module - The runtime for reducers
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicUsize, DecrementGuard, Duration, Effect, EffectFuture,
        EffectHandle, EffectTracking, Infallible, Ordering, Reducer, RwLock, StoreError,
    };
    use tokio::sync::broadcast;

    /// Default capacity of the action broadcast channel
    const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock` for concurrent access)
    /// 2. Reducer (state transitions)
    /// 3. Environment (injected dependencies)
    /// 4. Effect execution (with feedback loop)
    ///
    /// Cloning a store is cheap; clones share state, reducer, and environment.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        /// Every reduced action is broadcast here after the state changed.
        action_broadcast: broadcast::Sender<A>,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + Clone + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(initial_state, reducer, environment, DEFAULT_BROADCAST_CAPACITY)
        }

        /// Create a new store with a custom action broadcast capacity
        ///
        /// Slow observers that fall more than `capacity` actions behind
        /// receive `RecvError::Lagged` and skip ahead.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(capacity.max(1));

            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                action_broadcast,
            }
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Broadcasts the action to observers
        /// 4. Starts executing the returned effects
        ///
        /// `send()` returns after starting effect execution, not completion.
        /// Use the returned [`EffectHandle`] to wait for the effects.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.accepting()?;
            let Ok(handle) = self.apply(action, |_| Ok::<(), Infallible>(())).await;
            Ok(handle)
        }

        /// Send an action only if `check` accepts the state it would reduce
        ///
        /// The check runs under the same write lock as the reducer, so no
        /// other action can change the state in between. A rejected action
        /// is neither reduced nor broadcast.
        ///
        /// # Errors
        ///
        /// Returns the check's error, or [`StoreError::ShutdownInProgress`]
        /// (converted) if the store is shutting down.
        #[tracing::instrument(skip(self, action, check), name = "store_send_if")]
        pub async fn send_if<F, Err>(&self, action: A, check: F) -> Result<EffectHandle, Err>
        where
            F: FnOnce(&S) -> Result<(), Err>,
            Err: From<StoreError>,
        {
            self.accepting()?;
            self.apply(action, check).await
        }

        /// Send an action even while the store is shutting down
        ///
        /// For transitions that release something an accepted action
        /// acquired, such as lowering a busy flag.
        #[tracing::instrument(skip(self, action), name = "store_send_always")]
        pub async fn send_always(&self, action: A) -> EffectHandle {
            let Ok(handle) = self.apply(action, |_| Ok::<(), Infallible>(())).await;
            handle
        }

        fn accepting(&self) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }
            Ok(())
        }

        async fn apply<F, Err>(&self, action: A, check: F) -> Result<EffectHandle, Err>
        where
            F: FnOnce(&S) -> Result<(), Err>,
        {
            let (handle, tracking) = EffectHandle::new();

            let effects = {
                let mut state = self.state.write().await;
                check(&state)?;

                metrics::counter!("store.actions.total").increment(1);
                let observed = (self.action_broadcast.receiver_count() > 0).then(|| action.clone());

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());

                // Observers receive actions in reduction order
                if let Some(action) = observed {
                    let _ = self.action_broadcast.send(action);
                }
                effects
            };

            for effect in effects {
                self.execute_effect(effect, &tracking);
            }

            Ok(handle)
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let count = store.state(|s| s.items.len()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&state)
        }

        /// The injected environment
        #[must_use]
        pub fn environment(&self) -> &E {
            &self.environment
        }

        /// Subscribe to every action reduced by this store
        ///
        /// Each action is delivered after the state transition it caused,
        /// so a subscriber that reads state on receipt sees the new value.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Number of effects currently running across all actions
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Initiate graceful shutdown of the store
        ///
        /// This method:
        /// 1. Sets the shutdown flag (rejecting new actions)
        /// 2. Waits for pending effects to complete (with timeout)
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(pending_effects = pending, "Shutdown timeout");
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Whether [`Store::shutdown`] has been called
        #[must_use]
        pub fn is_shutting_down(&self) -> bool {
            self.shutdown.load(Ordering::Acquire)
        }

        /// Start executing an effect, tracked by the action's handle
        ///
        /// `Parallel` children are started independently; every other
        /// non-trivial effect runs to completion in one spawned task.
        fn execute_effect(&self, effect: Effect<A>, tracking: &EffectTracking) {
            match effect {
                Effect::None => {
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);
                    for effect in effects {
                        self.execute_effect(effect, tracking);
                    }
                },
                effect => {
                    if effect.is_none() {
                        return;
                    }
                    tracking.increment();
                    self.pending_effects.fetch_add(1, Ordering::SeqCst);

                    let guard = DecrementGuard {
                        tracking: tracking.clone(),
                        pending: Arc::clone(&self.pending_effects),
                    };
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guard = guard;
                        store.run_effect(effect).await;
                    });
                },
            }
        }

        /// Drive an effect to completion inside an already tracked task
        fn run_effect(&self, effect: Effect<A>) -> EffectFuture {
            let store = self.clone();
            Box::pin(async move {
                match effect {
                    Effect::None => {},
                    Effect::Future(fut) => {
                        metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            if let Err(error) = store.send(action).await {
                                tracing::warn!(%error, "Dropped feedback action");
                            }
                        }
                    },
                    Effect::Parallel(effects) => {
                        let runs = effects.into_iter().map(|effect| store.run_effect(effect));
                        futures::future::join_all(runs).await;
                    },
                    Effect::Sequential(effects) => {
                        metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                        for effect in effects {
                            store.run_effect(effect).await;
                        }
                    },
                }
            })
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                action_broadcast: self.action_broadcast.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use composable_rest_core::{smallvec, SmallVec};
    use std::sync::Mutex;

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
        log: Vec<&'static str>,
    }

    #[derive(Debug, Clone)]
    enum TestAction {
        Increment,
        Record(&'static str),
        ProduceEffect,
        ProduceParallelEffects,
        ProduceSequentialEffects,
        ProducePanickingEffect,
        Slow,
    }

    #[derive(Debug, Clone, Default)]
    struct TestEnv {
        hooks: Arc<Mutex<Vec<&'static str>>>,
    }

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                TestAction::Record(entry) => {
                    state.log.push(entry);
                    SmallVec::new()
                },
                TestAction::ProduceEffect => {
                    smallvec![Effect::Future(Box::pin(async { Some(TestAction::Increment) }))]
                },
                TestAction::ProduceParallelEffects => {
                    smallvec![Effect::Parallel(vec![
                        Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                        Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                        Effect::Future(Box::pin(async { Some(TestAction::Increment) })),
                    ])]
                },
                TestAction::ProduceSequentialEffects => {
                    let hooks = Arc::clone(&env.hooks);
                    let later = Arc::clone(&env.hooks);
                    smallvec![Effect::Sequential(vec![
                        Effect::fire_and_forget(async move {
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            hooks.lock().unwrap().push("first");
                        }),
                        Effect::fire_and_forget(async move {
                            later.lock().unwrap().push("second");
                        }),
                    ])]
                },
                TestAction::ProducePanickingEffect => {
                    smallvec![Effect::Future(Box::pin(async {
                        panic!("Intentional panic in effect for testing");
                    }))]
                },
                TestAction::Slow => {
                    smallvec![Effect::fire_and_forget(async {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                    })]
                },
            }
        }
    }

    fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv::default())
    }

    #[tokio::test]
    async fn test_send_action() {
        let store = store();

        store.send(TestAction::Increment).await.unwrap();
        store.send(TestAction::Increment).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 2);
    }

    #[tokio::test]
    async fn test_effect_future_feeds_back() {
        let store = store();

        let mut handle = store.send(TestAction::ProduceEffect).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_effect_parallel() {
        let store = store();

        let mut handle = store.send(TestAction::ProduceParallelEffects).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 3);
    }

    #[tokio::test]
    async fn test_effect_sequential_keeps_order() {
        let store = store();

        let mut handle = store.send(TestAction::ProduceSequentialEffects).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        let hooks = store.environment().hooks.lock().unwrap().clone();
        assert_eq!(hooks, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_panicking_effect_still_completes_handle() {
        let store = store();

        let mut handle = store.send(TestAction::ProducePanickingEffect).await.unwrap();
        handle.wait_with_timeout(Duration::from_secs(1)).await.unwrap();

        assert_eq!(store.pending_effects(), 0);
        // Store keeps working after an effect panicked
        store.send(TestAction::Increment).await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_handle_without_effects_is_complete() {
        let store = store();

        let mut handle = store.send(TestAction::Record("a")).await.unwrap();
        assert_eq!(handle.pending(), 0);
        handle.wait().await;

        let mut done = EffectHandle::completed();
        done.wait().await;
    }

    #[tokio::test]
    async fn test_subscribers_see_actions_after_transition() {
        let store = store();
        let mut rx = store.subscribe_actions();

        store.send(TestAction::Record("seen")).await.unwrap();

        let action = rx.recv().await.unwrap();
        assert!(matches!(action, TestAction::Record("seen")));
        assert_eq!(store.state(|s| s.log.clone()).await, vec!["seen"]);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_new_actions() {
        let store = store();

        store.shutdown(Duration::from_secs(1)).await.unwrap();

        assert!(store.is_shutting_down());
        let result = store.send(TestAction::Increment).await;
        assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
    }

    #[tokio::test]
    async fn test_shutdown_times_out_with_running_effects() {
        let store = store();

        store.send(TestAction::Slow).await.unwrap();
        let result = store.shutdown(Duration::from_millis(20)).await;

        assert!(matches!(result, Err(StoreError::ShutdownTimeout(1))));
    }

    #[derive(Debug, PartialEq)]
    enum CheckError {
        TooHigh(i32),
        Store,
    }

    impl From<StoreError> for CheckError {
        fn from(_: StoreError) -> Self {
            Self::Store
        }
    }

    #[tokio::test]
    async fn test_send_if_checks_under_lock() {
        let store = store();
        let mut rx = store.subscribe_actions();
        let at_most_one = |s: &TestState| {
            if s.value >= 1 { Err(CheckError::TooHigh(s.value)) } else { Ok(()) }
        };

        store.send_if(TestAction::Increment, at_most_one).await.unwrap();
        let rejected = store.send_if(TestAction::Increment, at_most_one).await;

        assert!(matches!(rejected, Err(CheckError::TooHigh(1))));
        assert_eq!(store.state(|s| s.value).await, 1);
        // Only the accepted action is broadcast
        assert!(matches!(rx.recv().await.unwrap(), TestAction::Increment));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_send_if_rejected_during_shutdown() {
        let store = store();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let result = store.send_if(TestAction::Increment, |_| Ok::<(), CheckError>(())).await;
        assert_eq!(result.err(), Some(CheckError::Store));
    }

    #[tokio::test]
    async fn test_send_always_bypasses_shutdown() {
        let store = store();
        store.shutdown(Duration::from_secs(1)).await.unwrap();

        let mut handle = store.send_always(TestAction::Record("release")).await;
        handle.wait().await;

        assert_eq!(store.state(|s| s.log.clone()).await, vec!["release"]);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = store();
        let other = store.clone();

        other.send(TestAction::Increment).await.unwrap();

        assert_eq!(store.state(|s| s.value).await, 1);
    }
}
