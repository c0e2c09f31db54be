//! Circuit breaker for protecting a failing backend service
//!
//! Tracks consecutive qualifying failures for one named service and gates
//! whether an attempt is allowed at all. Three states:
//! - Closed: normal operation, attempts pass through
//! - Open: attempts are rejected without touching the network until the
//!   recovery timeout elapses
//! - HalfOpen: the cooldown has elapsed and a probe is admitted to test
//!   whether the service recovered
//!
//! HalfOpen is not single-flight: two callers racing through `can_execute`
//! after the cooldown may both probe. Callers drive one attempt at a time per
//! retry loop, so in practice a single probe is in flight.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Circuit is closed, attempts pass through normally.
    Closed,
    /// Circuit is open, attempts fail immediately.
    Open,
    /// Circuit is half-open, testing service recovery.
    HalfOpen,
}

/// Configuration for circuit breaker behavior, fixed at construction.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive qualifying failures before the circuit opens. Must be >= 1.
    pub failure_threshold: u32,
    /// How long an open circuit waits before admitting a probe.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(30),
        }
    }
}

/// Read-only view of a breaker for diagnostics panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<Instant>,
    pub next_attempt_time: Option<Instant>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    next_attempt_time: Option<Instant>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            last_failure_time: None,
            next_attempt_time: None,
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.failure_count = 0;
        self.last_failure_time = None;
        self.next_attempt_time = None;
    }
}

/// Per-service failure tracker gating execution attempts.
///
/// The breaker never errors and does no I/O; it only answers yes/no and
/// tracks counters. State lives behind a mutex so concurrent call sites
/// sharing one named service observe consistent transitions.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker for the named service with the given configuration.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    /// Logical service name this breaker guards.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an attempt is allowed right now.
    ///
    /// An open breaker whose recovery timeout has elapsed flips to HalfOpen
    /// as a side effect of this call and admits the probe.
    pub async fn can_execute(&self) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let due = inner
                    .next_attempt_time
                    .is_none_or(|t| Instant::now() >= t);
                if due {
                    inner.state = CircuitState::HalfOpen;
                    debug!(service = %self.name, "circuit breaker half-open, admitting probe");
                }
                due
            }
        }
    }

    /// Record a success while the circuit is closed.
    pub async fn on_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count = 0;
    }

    /// Record a qualifying failure. Opens the circuit once the threshold of
    /// consecutive failures is reached.
    pub async fn on_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.failure_count += 1;
        inner.last_failure_time = Some(Instant::now());
        if inner.state == CircuitState::Closed && inner.failure_count >= self.config.failure_threshold
        {
            inner.state = CircuitState::Open;
            inner.next_attempt_time = Some(Instant::now() + self.config.recovery_timeout);
            warn!(
                service = %self.name,
                failures = inner.failure_count,
                cooldown_secs = self.config.recovery_timeout.as_secs(),
                "circuit breaker opened"
            );
        }
    }

    /// Record a successful probe: full recovery, back to Closed.
    pub async fn on_half_open_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.close();
        info!(service = %self.name, "circuit breaker recovered, closing");
    }

    /// Record a failed probe: back to Open with a fresh cooldown.
    pub async fn on_half_open_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = CircuitState::Open;
        inner.last_failure_time = Some(Instant::now());
        inner.next_attempt_time = Some(Instant::now() + self.config.recovery_timeout);
        warn!(service = %self.name, "probe failed, circuit breaker reopening");
    }

    /// Force the breaker back to Closed, clearing all counters and
    /// timestamps. Used for manual recovery, e.g. a user-facing retry button
    /// after a circuit-breaker error.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.close();
        info!(service = %self.name, "circuit breaker manually reset");
    }

    /// Current state.
    pub async fn state(&self) -> CircuitState {
        self.inner.lock().await.state
    }

    /// Read-only snapshot for diagnostics.
    pub async fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.inner.lock().await;
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_time: inner.last_failure_time,
            next_attempt_time: inner.next_attempt_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: timeout,
            },
        )
    }

    #[tokio::test]
    async fn opens_after_exactly_threshold_failures() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.on_failure().await;
        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);

        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        let snap = breaker.snapshot().await;
        assert_eq!(snap.failure_count, 3);
        assert!(snap.next_attempt_time.is_some());
        assert!(snap.last_failure_time.is_some());
    }

    #[tokio::test]
    async fn success_resets_failure_count_while_closed() {
        let breaker = breaker(3, Duration::from_secs(30));

        breaker.on_failure().await;
        breaker.on_failure().await;
        breaker.on_success().await;
        assert_eq!(breaker.snapshot().await.failure_count, 0);

        // Two more failures stay below the threshold after the reset.
        breaker.on_failure().await;
        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_rejects_until_due_then_admits_one_probe() {
        let breaker = breaker(1, Duration::from_secs(10));

        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);
        assert!(!breaker.can_execute().await);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(!breaker.can_execute().await);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.can_execute().await);
        assert_eq!(breaker.state().await, CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_fully_recovers() {
        let breaker = breaker(1, Duration::from_secs(5));

        breaker.on_failure().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.can_execute().await);

        breaker.on_half_open_success().await;
        let snap = breaker.snapshot().await;
        assert_eq!(snap.state, CircuitState::Closed);
        assert_eq!(snap.failure_count, 0);
        assert_eq!(snap.last_failure_time, None);
        assert_eq!(snap.next_attempt_time, None);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_failure_reopens_with_fresh_deadline() {
        let breaker = breaker(1, Duration::from_secs(5));

        breaker.on_failure().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(breaker.can_execute().await);

        let before = Instant::now();
        breaker.on_half_open_failure().await;
        let snap = breaker.snapshot().await;
        assert_eq!(snap.state, CircuitState::Open);
        assert_eq!(snap.next_attempt_time, Some(before + Duration::from_secs(5)));
        assert!(!breaker.can_execute().await);
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let breaker = breaker(1, Duration::from_secs(30));

        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        breaker.reset().await;
        assert_eq!(
            breaker.snapshot().await,
            CircuitSnapshot {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_time: None,
                next_attempt_time: None,
            }
        );
        assert!(breaker.can_execute().await);
    }
}
