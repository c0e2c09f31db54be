//! Solace Resilience: client-side fault tolerance for the Solace care platform
//!
//! # Overview
//!
//! This crate sits between UI code and a REST backend and provides the
//! building blocks that keep a flaky network from turning into a broken
//! experience:
//!
//! - **Circuit Breaker**: per-service failure tracker that fails fast when a
//!   backend service is unhealthy, instead of hammering it
//! - **Retry Manager**: bounded retries with exponential backoff and jitter,
//!   gated by the circuit breaker, retrying only transient failures
//! - **Error Classifier**: maps any failure to a `{message, type, action,
//!   severity}` tuple so toasts and alerts render the right affordance
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - The REST API surface (endpoints, payloads, authentication)
//! - UI rendering and navigation
//! - The HTTP client in use (an optional `reqwest` bridge is provided)
//!
//! Callers supply a zero-argument async operation and a logical service
//! name, and consume a result or a typed error.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        UI component (booking, forum)    │
//! └─────────────┬───────────────────────────┘
//!               │ async closure + service name
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │        Retry Manager                    │  ← backoff + jitter, bounded
//! └─────────────┬───────────────────────────┘
//!               │ gate / report outcome
//!               ▼
//! ┌─────────────────────────────────────────┐
//! │        Circuit Breaker (per service)    │  ← fail-fast protection
//! └─────────────┬───────────────────────────┘
//!               │
//!               ▼
//!          REST backend
//!
//!  On any surfaced failure:
//!    Error Classifier → {message, type, action, severity} → toast/alert
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use solace_resilience::prelude::*;
//!
//! # async fn fetch_slots() -> Result<Vec<String>, ApiFailure> { Ok(vec![]) }
//! # async fn example() {
//! let registry = Arc::new(CircuitBreakerRegistry::default());
//! let manager = RetryManager::new(registry.clone());
//!
//! match manager.retry_slot_fetch(fetch_slots).await {
//!     Ok(slots) => println!("{} slots", slots.len()),
//!     Err(err) => {
//!         let classified = classify(Some(&err), &ClassifyContext::SlotAvailability);
//!         eprintln!("{} (suggested action: {:?})", classified.message, classified.action);
//!     }
//! }
//! # }
//! ```

pub mod circuit_breaker;
pub mod classify;
pub mod error;
pub mod registry;
pub mod retry;

// Re-export main types for convenience
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState};
pub use classify::{classify, ClassifiedError, ClassifyContext, ErrorKind, RecoveryAction, Severity};
pub use error::{ApiFailure, ApiResult, RetryError, TransportCode};
pub use registry::CircuitBreakerRegistry;
pub use retry::{is_retryable, trips_breaker, RetryManager, RetryObserver, RetryOptions};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use solace_resilience::prelude::*;
/// ```
pub mod prelude {
    pub use super::circuit_breaker::{
        CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot, CircuitState,
    };
    pub use super::classify::{
        classify, ClassifiedError, ClassifyContext, ErrorKind, RecoveryAction, Severity,
    };
    pub use super::error::{ApiFailure, ApiResult, RetryError, TransportCode};
    pub use super::registry::CircuitBreakerRegistry;
    pub use super::retry::{RetryManager, RetryObserver, RetryOptions};
}
