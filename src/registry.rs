//! Registry of circuit breakers keyed by logical service name
//!
//! The registry is an explicit, injectable object: construct one at
//! application start and hand it (behind an `Arc`) to every call site, rather
//! than relying on module-level singleton state. Breakers are created lazily
//! on first use and live as long as the registry.
//!
//! Besides normal success/failure reporting through the retry driver, the
//! only supported external mutation is [`CircuitBreakerRegistry::reset`],
//! which backs user-facing "try again" affordances after a circuit-breaker
//! error.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitSnapshot};

/// Process-wide map of service name to circuit breaker.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers all share the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Breaker for the named service, created lazily on first use.
    pub async fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().await;
        breakers
            .entry(service.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.config.clone())))
            .clone()
    }

    /// Force the named breaker back to Closed. Returns false when no breaker
    /// exists for the service (nothing was ever routed through it).
    pub async fn reset(&self, service: &str) -> bool {
        let breaker = {
            let breakers = self.breakers.lock().await;
            breakers.get(service).cloned()
        };
        match breaker {
            Some(breaker) => {
                breaker.reset().await;
                true
            }
            None => false,
        }
    }

    /// Diagnostic snapshot of the named breaker, if one exists.
    pub async fn status(&self, service: &str) -> Option<CircuitSnapshot> {
        let breaker = {
            let breakers = self.breakers.lock().await;
            breakers.get(service).cloned()
        };
        match breaker {
            Some(breaker) => Some(breaker.snapshot().await),
            None => None,
        }
    }

    /// Snapshots of every breaker, sorted by service name.
    pub async fn snapshot_all(&self) -> Vec<(String, CircuitSnapshot)> {
        let breakers: Vec<(String, Arc<CircuitBreaker>)> = {
            let breakers = self.breakers.lock().await;
            breakers
                .iter()
                .map(|(name, breaker)| (name.clone(), breaker.clone()))
                .collect()
        };
        let mut snapshots = Vec::with_capacity(breakers.len());
        for (name, breaker) in breakers {
            snapshots.push((name, breaker.snapshot().await));
        }
        snapshots.sort_by(|a, b| a.0.cmp(&b.0));
        snapshots
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;

    #[tokio::test]
    async fn same_service_shares_one_breaker() {
        let registry = CircuitBreakerRegistry::default();

        let a = registry.breaker("appointments").await;
        let b = registry.breaker("appointments").await;
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.breaker("slots").await;
        assert!(!Arc::ptr_eq(&a, &other));
    }

    #[tokio::test]
    async fn reset_only_touches_known_services() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        assert!(!registry.reset("appointments").await);

        let breaker = registry.breaker("appointments").await;
        breaker.on_failure().await;
        assert_eq!(breaker.state().await, CircuitState::Open);

        assert!(registry.reset("appointments").await);
        assert_eq!(breaker.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn status_and_snapshot_all() {
        let registry = CircuitBreakerRegistry::default();

        assert!(registry.status("forum").await.is_none());

        registry.breaker("slots").await;
        registry.breaker("forum").await;

        let status = registry.status("forum").await.unwrap();
        assert_eq!(status.state, CircuitState::Closed);

        let all = registry.snapshot_all().await;
        let names: Vec<&str> = all.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["forum", "slots"]);
    }
}
