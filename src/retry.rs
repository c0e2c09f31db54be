//! Retry driver with exponential backoff, jitter, and circuit breaking
//!
//! Wraps a caller-supplied async operation and drives it up to a bounded
//! number of attempts. Before the first attempt the named circuit breaker is
//! consulted; an open circuit fails fast without touching the network.
//! Failures are split into retryable (timeouts, network faults, 5xx, 408,
//! 429) and non-retryable (validation, auth, not-found), and non-retryable
//! failures are surfaced on first occurrence — retrying a 422 just burns the
//! budget.
//!
//! Backoff between attempts is exponential with symmetric jitter to avoid
//! synchronized retry storms: `delay = min(base * multiplier^(n-1), max)`,
//! then +/- 25% at random.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use rand::Rng;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::circuit_breaker::CircuitState;
use crate::error::{ApiFailure, RetryError};
use crate::registry::CircuitBreakerRegistry;

/// Service name used when a call site does not pick one.
pub const DEFAULT_SERVICE: &str = "default";
/// Specialist directory and search endpoints.
pub const SERVICE_SPECIALISTS: &str = "specialists";
/// Appointment booking and management endpoints.
pub const SERVICE_APPOINTMENTS: &str = "appointments";
/// Slot availability endpoints.
pub const SERVICE_SLOTS: &str = "slots";

/// HTTP statuses assumed transient and worth retrying.
const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Message fragments that mark a failure as transient when no status or
/// transport code is available.
const TRANSIENT_NEEDLES: [&str; 3] = ["timeout", "network", "connection"];

/// Tuning knobs for one retry loop.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Maximum number of attempts, including the first. Must be >= 1.
    pub max_retries: u32,
    /// Delay before the second attempt; later attempts grow exponentially.
    pub base_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Cap on the computed delay, before jitter.
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryOptions {
    /// Default options with a different attempt budget.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }
}

/// Observer hooks for the retry loop.
///
/// All methods have no-op defaults; implement only what you need. Hooks run
/// synchronously inside the loop, so keep them cheap (update a counter, emit
/// a toast, log).
pub trait RetryObserver: Send + Sync {
    /// Called after a retryable failure, before sleeping `delay`.
    fn on_retry(&self, _error: &ApiFailure, _attempt: u32, _delay: Duration) {}

    /// Called when the final attempt has failed.
    fn on_exhausted(&self, _error: &ApiFailure, _attempts: u32) {}
}

/// Whether a failure is transient enough to retry at all.
///
/// Retryable: status in {408, 429, 500, 502, 503, 504}, any transport fault
/// with a known code, or a message mentioning timeout/network/connection.
/// Everything else (400/401/403/404/422, ...) is surfaced on first
/// occurrence.
pub fn is_retryable(error: &ApiFailure) -> bool {
    match error {
        ApiFailure::Response {
            status, message, ..
        } => RETRYABLE_STATUSES.contains(status) || message_is_transient(message),
        ApiFailure::Transport { code, message } => code.is_some() || message_is_transient(message),
        ApiFailure::Local(message) => message_is_transient(message),
    }
}

/// Whether a failure counts toward opening the circuit breaker.
///
/// Only failures that indicate backend distress qualify: 5xx, request
/// timeout (408), rate limiting (429), or transport-level faults. A
/// retryable-but-client-shaped condition does not charge the breaker.
pub fn trips_breaker(error: &ApiFailure) -> bool {
    match error {
        ApiFailure::Response { status, .. } => *status >= 500 || matches!(*status, 408 | 429),
        other => is_retryable(other),
    }
}

fn message_is_transient(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_NEEDLES.iter().any(|needle| lower.contains(needle))
}

/// Delay before the attempt after `attempt` (1-based), with +/- 25% jitter.
fn backoff_delay(options: &RetryOptions, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1) as i32;
    let raw = options.base_delay.as_secs_f64() * options.backoff_multiplier.powi(exponent);
    let capped = raw.min(options.max_delay.as_secs_f64());
    let jitter = capped * 0.25 * rand::rng().random_range(-1.0..=1.0);
    Duration::from_secs_f64((capped + jitter).max(0.0))
}

/// Drives retries for wrapped API calls, one circuit breaker per service.
///
/// Construct one per application with a shared registry; the manager itself
/// is cheap to clone.
#[derive(Clone)]
pub struct RetryManager {
    registry: Arc<CircuitBreakerRegistry>,
    observer: Option<Arc<dyn RetryObserver>>,
}

impl std::fmt::Debug for RetryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryManager")
            .field("registry", &self.registry)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl RetryManager {
    /// Create a manager over the given breaker registry.
    pub fn new(registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            registry,
            observer: None,
        }
    }

    /// Attach an observer notified on every retry and exhaustion.
    pub fn with_observer(mut self, observer: Arc<dyn RetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// The breaker registry this manager reports into.
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Execute `op` with retry, backoff, and circuit breaking for the named
    /// service.
    ///
    /// Returns the first successful value, or:
    /// - [`RetryError::CircuitOpen`] when the breaker rejected the call
    ///   before any attempt was made,
    /// - [`RetryError::Rejected`] when the first failure was not retryable,
    /// - [`RetryError::Exhausted`] when every attempt failed with a
    ///   retryable error.
    pub async fn retry<T, F, Fut>(
        &self,
        service: &str,
        options: RetryOptions,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        let breaker = self.registry.breaker(service).await;

        if !breaker.can_execute().await {
            let snapshot = breaker.snapshot().await;
            let next_attempt_time = snapshot.next_attempt_time.unwrap_or_else(Instant::now);
            let retry_after = next_attempt_time.saturating_duration_since(Instant::now());
            debug!(service, retry_after_secs = retry_after.as_secs(), "circuit open, failing fast");
            return Err(RetryError::CircuitOpen {
                service: service.to_string(),
                next_attempt_time,
                retry_after,
            });
        }

        let max_attempts = options.max_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            // Whether this attempt is the recovery probe of a half-open
            // circuit decides which breaker transition the outcome drives.
            let probing = breaker.state().await == CircuitState::HalfOpen;

            match op().await {
                Ok(value) => {
                    if probing {
                        breaker.on_half_open_success().await;
                    } else {
                        breaker.on_success().await;
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if !is_retryable(&error) {
                        debug!(service, attempt, %error, "failure is not retryable, surfacing");
                        return Err(RetryError::Rejected { source: error });
                    }

                    if trips_breaker(&error) {
                        if probing {
                            breaker.on_half_open_failure().await;
                        } else {
                            breaker.on_failure().await;
                        }
                    }

                    if attempt >= max_attempts {
                        if let Some(observer) = &self.observer {
                            observer.on_exhausted(&error, attempt);
                        }
                        return Err(RetryError::Exhausted {
                            attempts: attempt,
                            source: error,
                        });
                    }

                    let delay = backoff_delay(&options, attempt);
                    debug!(
                        service,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "retrying after backoff"
                    );
                    if let Some(observer) = &self.observer {
                        observer.on_retry(&error, attempt, delay);
                    }
                    sleep(delay).await;
                }
            }
        }
    }

    /// Execute `op` against the default service with default options.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        self.retry(DEFAULT_SERVICE, RetryOptions::default(), op).await
    }

    /// Retry wrapper for specialist search and directory fetches.
    pub async fn retry_specialist_search<T, F, Fut>(&self, op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        self.retry(SERVICE_SPECIALISTS, RetryOptions::default(), op)
            .await
    }

    /// Retry wrapper for appointment booking.
    ///
    /// Bookings are side-effecting writes, so the budget is lower: retrying
    /// one aggressively risks double-booking on an ambiguous failure.
    pub async fn retry_booking<T, F, Fut>(&self, op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        self.retry(
            SERVICE_APPOINTMENTS,
            RetryOptions::with_max_retries(2),
            op,
        )
        .await
    }

    /// Retry wrapper for slot availability fetches.
    pub async fn retry_slot_fetch<T, F, Fut>(&self, op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        self.retry(SERVICE_SLOTS, RetryOptions::default(), op).await
    }

    /// Retry wrapper for appointment management (cancel, reschedule,
    /// complete). Shares the booking budget: these are writes too.
    pub async fn retry_appointment_action<T, F, Fut>(&self, op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        self.retry(
            SERVICE_APPOINTMENTS,
            RetryOptions::with_max_retries(2),
            op,
        )
        .await
    }
}
