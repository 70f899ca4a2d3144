//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: downstream assumed down, requests fail fast
//! - Half-Open: a limited number of probes test if the downstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: window full and failure rate >= threshold
//! Open → Half-Open: first permission check after the open wait elapsed
//! Half-Open → Closed: every probe succeeded
//! Half-Open → Open: any probe failed
//! ```
//!
//! # Design Decisions
//! - Count-based sliding window, not time-based
//! - One mutex around a small struct: a permission check, its probe-slot consumption and a
//!   window update are each a single critical section
//! - Listeners are notified after the lock is released
//! - Every transition bumps a generation; a permit settled in a later generation is ignored

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    /// Gauge value: 0 = closed, 1 = open, 2 = half-open.
    pub fn code(&self) -> i64 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// Observer of state transitions.
pub trait BreakerListener: Send + Sync {
    fn on_transition(&self, from: CircuitState, to: CircuitState);
}

#[derive(Debug)]
struct BreakerCore {
    state: CircuitState,
    /// Most recent results, `true` for failure.
    window: VecDeque<bool>,
    failures: usize,
    opened_at: Option<Instant>,
    probes_remaining: usize,
    probes_succeeded: usize,
    generation: u64,
}

type Transition = Option<(CircuitState, CircuitState)>;

/// Count-based circuit breaker.
pub struct CircuitBreaker {
    name: String,
    window_size: usize,
    failure_rate_threshold: f64,
    open_wait: Duration,
    probe_count: usize,
    core: Mutex<BreakerCore>,
    listeners: Vec<Arc<dyn BreakerListener>>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("window_size", &self.window_size)
            .field("failure_rate_threshold", &self.failure_rate_threshold)
            .field("open_wait", &self.open_wait)
            .field("probe_count", &self.probe_count)
            .finish()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        let window_size = config.sliding_window_size.max(1);
        Self {
            name: name.into(),
            window_size,
            failure_rate_threshold: config.failure_rate_threshold,
            open_wait: config.open_state_wait(),
            probe_count: config.half_open_probe_count.max(1),
            core: Mutex::new(BreakerCore {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(window_size),
                failures: 0,
                opened_at: None,
                probes_remaining: 0,
                probes_succeeded: 0,
                generation: 0,
            }),
            listeners: Vec::new(),
        }
    }

    /// Register a transition listener.
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state. Does not advance Open → Half-Open; only permission checks do.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Failure rate (percent) of the window, once it is full.
    pub fn failure_rate(&self) -> Option<f64> {
        let core = self.lock();
        (core.window.len() == self.window_size)
            .then(|| core.failures as f64 * 100.0 / self.window_size as f64)
    }

    /// Ask to proceed. `false` rejects without consuming a probe slot.
    pub fn try_acquire_permission(&self) -> bool {
        self.grant().is_some()
    }

    /// Generation the permission was granted in, or `None` when rejected.
    fn grant(&self) -> Option<u64> {
        let (granted, transition) = {
            let mut core = self.lock();
            let mut transition = None;
            if core.state == CircuitState::Open {
                let elapsed = core
                    .opened_at
                    .map(|at| at.elapsed() >= self.open_wait)
                    .unwrap_or(true);
                if elapsed {
                    transition = self.transition(&mut core, CircuitState::HalfOpen);
                }
            }

            let permitted = match core.state {
                CircuitState::Closed => true,
                CircuitState::Open => false,
                CircuitState::HalfOpen => {
                    if core.probes_remaining > 0 {
                        core.probes_remaining -= 1;
                        true
                    } else {
                        false
                    }
                }
            };
            (permitted.then_some(core.generation), transition)
        };
        self.notify(transition);
        granted
    }

    /// Acquire a permission as an RAII permit.
    ///
    /// Dropping the permit without `record` releases the permission without counting a result.
    pub fn acquire(self: &Arc<Self>) -> Option<BreakerPermit> {
        self.grant().map(|generation| BreakerPermit {
            breaker: Arc::clone(self),
            generation,
            settled: false,
        })
    }

    /// Record the result of a permitted call.
    pub fn on_result(&self, success: bool) {
        self.settle(None, success);
    }

    fn on_result_for(&self, generation: u64, success: bool) {
        self.settle(Some(generation), success);
    }

    fn settle(&self, generation: Option<u64>, success: bool) {
        let transition = {
            let mut core = self.lock();
            if generation.is_some_and(|g| g != core.generation) {
                // Granted before the last transition.
                return;
            }
            match core.state {
                CircuitState::Closed => {
                    core.window.push_back(!success);
                    if !success {
                        core.failures += 1;
                    }
                    if core.window.len() > self.window_size {
                        if let Some(true) = core.window.pop_front() {
                            core.failures -= 1;
                        }
                    }
                    let full = core.window.len() == self.window_size;
                    let rate = core.failures as f64 * 100.0 / self.window_size as f64;
                    if full && rate >= self.failure_rate_threshold {
                        self.transition(&mut core, CircuitState::Open)
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen => {
                    if !success {
                        self.transition(&mut core, CircuitState::Open)
                    } else {
                        core.probes_succeeded += 1;
                        if core.probes_succeeded >= self.probe_count {
                            self.transition(&mut core, CircuitState::Closed)
                        } else {
                            None
                        }
                    }
                }
                // Late result of a call admitted before the breaker opened.
                CircuitState::Open => None,
            }
        };
        self.notify(transition);
    }

    /// Give back a permission that will never produce a result.
    ///
    /// Not counted in the window. In Half-Open the probe slot returns to the budget.
    pub fn release_permission(&self) {
        self.release(None);
    }

    fn release_permission_for(&self, generation: u64) {
        self.release(Some(generation));
    }

    fn release(&self, generation: Option<u64>) {
        let mut core = self.lock();
        if generation.is_some_and(|g| g != core.generation) {
            return;
        }
        if core.state == CircuitState::HalfOpen
            && core.probes_remaining + core.probes_succeeded < self.probe_count
        {
            core.probes_remaining += 1;
        }
    }

    /// Move to Open immediately and restart the open timer.
    pub fn force_open(&self) {
        let transition = {
            let mut core = self.lock();
            if core.state == CircuitState::Open {
                core.opened_at = Some(Instant::now());
                None
            } else {
                self.transition(&mut core, CircuitState::Open)
            }
        };
        self.notify(transition);
    }

    fn transition(&self, core: &mut BreakerCore, to: CircuitState) -> Transition {
        let from = core.state;
        core.state = to;
        core.generation = core.generation.wrapping_add(1);
        core.window.clear();
        core.failures = 0;
        core.probes_succeeded = 0;
        match to {
            CircuitState::Open => {
                core.opened_at = Some(Instant::now());
                core.probes_remaining = 0;
            }
            CircuitState::HalfOpen => {
                core.probes_remaining = self.probe_count;
            }
            CircuitState::Closed => {
                core.opened_at = None;
                core.probes_remaining = 0;
            }
        }
        Some((from, to))
    }

    fn notify(&self, transition: Transition) {
        let Some((from, to)) = transition else {
            return;
        };
        tracing::info!(breaker = %self.name, from = %from, to = %to, code = to.code(), "Circuit breaker state transition");
        for listener in &self.listeners {
            listener.on_transition(from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A granted breaker permission.
#[derive(Debug)]
pub struct BreakerPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    settled: bool,
}

impl BreakerPermit {
    /// Report the call result, consuming the permit.
    pub fn record(mut self, success: bool) {
        self.settled = true;
        self.breaker.on_result_for(self.generation, success);
    }
}

impl Drop for BreakerPermit {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release_permission_for(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("test", &CircuitBreakerConfig::default())
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(CircuitState, CircuitState)>>);

    impl BreakerListener for Recorder {
        fn on_transition(&self, from: CircuitState, to: CircuitState) {
            self.0.lock().unwrap().push((from, to));
        }
    }

    fn trip(cb: &CircuitBreaker) {
        for i in 0..10 {
            assert!(cb.try_acquire_permission());
            cb.on_result(i % 2 == 0);
        }
    }

    #[tokio::test]
    async fn test_opens_when_window_full_at_threshold() {
        let cb = breaker();
        // 5 failures and 5 successes, interleaved.
        for i in 0..9 {
            assert!(cb.try_acquire_permission());
            cb.on_result(i % 2 == 0);
            assert_eq!(cb.state(), CircuitState::Closed, "window not full yet");
        }
        assert!(cb.try_acquire_permission());
        cb.on_result(false);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire_permission());
    }

    #[tokio::test]
    async fn test_stays_closed_below_threshold() {
        let cb = breaker();
        for i in 0..20 {
            cb.on_result(i % 5 != 0); // 20% failures
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_rate(), Some(20.0));
    }

    #[tokio::test]
    async fn test_window_slides_fifo() {
        let cb = breaker();
        for _ in 0..4 {
            cb.on_result(false);
        }
        for _ in 0..10 {
            cb.on_result(true);
        }
        // The four failures have slid out.
        assert_eq!(cb.failure_rate(), Some(0.0));
        for _ in 0..4 {
            cb.on_result(false);
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.on_result(false);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_permits_exact_probe_budget() {
        let cb = breaker();
        trip(&cb);
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(!cb.try_acquire_permission());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cb.try_acquire_permission());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire_permission());
        assert!(cb.try_acquire_permission());
        assert!(!cb.try_acquire_permission());

        cb.on_result(true);
        cb.on_result(true);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.on_result(true);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_rate(), None, "window cleared on close");
        assert!(cb.try_acquire_permission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens_and_restarts_timer() {
        let cb = breaker();
        trip(&cb);
        tokio::time::advance(Duration::from_secs(5)).await;

        assert!(cb.try_acquire_permission());
        cb.on_result(true);
        assert!(cb.try_acquire_permission());
        cb.on_result(false);
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire_permission());

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(!cb.try_acquire_permission());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cb.try_acquire_permission());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_probe_slot_returns_to_budget() {
        let cb = breaker();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;

        for _ in 0..3 {
            assert!(cb.try_acquire_permission());
        }
        assert!(!cb.try_acquire_permission());
        cb.release_permission();
        assert!(cb.try_acquire_permission());

        // Releasing more than was taken never grows the budget.
        cb.on_result(true);
        cb.release_permission();
        cb.release_permission();
        cb.release_permission();
        assert!(cb.try_acquire_permission());
        assert!(cb.try_acquire_permission());
        assert!(!cb.try_acquire_permission());
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_drop_releases_and_record_counts() {
        let cb = Arc::new(breaker());
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;

        let a = cb.acquire().unwrap();
        let b = cb.acquire().unwrap();
        let c = cb.acquire().unwrap();
        assert!(cb.acquire().is_none());

        drop(c);
        let c = cb.acquire().expect("slot returned by drop");
        a.record(true);
        b.record(true);
        c.record(true);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_probes_never_exceed_budget() {
        let cb = Arc::new(breaker());
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;
        // First check performs the Open → Half-Open transition.
        assert!(cb.try_acquire_permission());

        let granted = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cb = Arc::clone(&cb);
                let granted = Arc::clone(&granted);
                std::thread::spawn(move || {
                    if cb.try_acquire_permission() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(granted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permit_from_closed_never_grows_half_open_budget() {
        let cb = Arc::new(breaker());
        let stale = cb.acquire().unwrap();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;

        let trial = cb.acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        drop(stale);

        let mut granted = vec![trial];
        while let Some(permit) = cb.acquire() {
            granted.push(permit);
        }
        assert_eq!(granted.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_successes_from_closed_do_not_close_breaker() {
        let cb = Arc::new(breaker());
        let stale: Vec<_> = (0..3).map(|_| cb.acquire().unwrap()).collect();
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;

        let trial = cb.acquire().unwrap();
        for permit in stale {
            permit.record(true);
        }
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        trial.record(false);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_from_previous_half_open_is_ignored() {
        let cb = Arc::new(breaker());
        cb.force_open();
        tokio::time::advance(Duration::from_secs(5)).await;

        let failing = cb.acquire().unwrap();
        let slow = cb.acquire().unwrap();
        failing.record(false);
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(cb.try_acquire_permission());
        slow.record(true);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire_permission());
        assert!(cb.try_acquire_permission());
        assert!(!cb.try_acquire_permission());
    }

    #[tokio::test]
    async fn test_concurrent_results_are_not_lost() {
        let config = CircuitBreakerConfig {
            sliding_window_size: 100,
            failure_rate_threshold: 100.0,
            ..CircuitBreakerConfig::default()
        };
        let cb = Arc::new(CircuitBreaker::new("lossless", &config));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cb = Arc::clone(&cb);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        cb.on_result(i % 5 != 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cb.failure_rate(), Some(20.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_sees_every_transition() {
        let recorder = Arc::new(Recorder::default());
        let cb = breaker().with_listener(recorder.clone());
        trip(&cb);
        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..3 {
            assert!(cb.try_acquire_permission());
            cb.on_result(true);
        }

        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(CircuitState::Closed.code(), 0);
        assert_eq!(CircuitState::Open.code(), 1);
        assert_eq!(CircuitState::HalfOpen.code(), 2);
        assert_eq!(CircuitState::HalfOpen.to_string(), "HALF_OPEN");
    }
}
