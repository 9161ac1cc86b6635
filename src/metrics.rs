//! Flat atomic request counters and a health-check registry, consumed by
//! the metrics/health middleware and exposed to introspection endpoints.

use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

/// Lock-free request/response/error counters.
///
/// All mutation is via atomic add/subtract; [`Metrics::snapshot`] loads
/// each counter independently and does not guarantee a cross-counter
/// consistent view, matching the spec's stated tradeoff.
#[derive(Default)]
pub struct Metrics {
    total_requests: AtomicU64,
    total_responses: AtomicU64,
    total_errors: AtomicU64,
    total_panics: AtomicU64,
    in_flight: AtomicI64,
    per_method: DashMap<String, AtomicU64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub total_responses: u64,
    pub total_errors: u64,
    pub total_panics: u64,
    pub in_flight: i64,
    pub per_method: HashMap<String, u64>,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Metrics::default()
    }

    pub fn record_request(&self, method: &str) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        self.per_method
            .entry(method.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self) {
        self.total_responses.fetch_add(1, Ordering::Relaxed);
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.total_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.total_panics.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            total_responses: self.total_responses.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            total_panics: self.total_panics.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            per_method: self
                .per_method
                .iter()
                .map(|e| (e.key().clone(), e.value().load(Ordering::Relaxed)))
                .collect(),
        }
    }
}

/// Position in the health lattice: `Healthy < Degraded < Unhealthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    pub message: String,
}

impl CheckResult {
    #[must_use]
    pub fn healthy() -> Self {
        CheckResult {
            status: HealthStatus::Healthy,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn unhealthy(message: impl Into<String>) -> Self {
        CheckResult {
            status: HealthStatus::Unhealthy,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateHealth {
    pub status: HealthStatus,
    pub ready: bool,
    pub uptime_secs: u64,
    pub checks: HashMap<String, CheckResult>,
}

type CheckFn = Arc<dyn Fn() -> CheckResult + Send + Sync>;

/// Name-keyed registry of health evaluators plus a readiness flag, matching
/// the familiar liveness/readiness split used by container orchestrators.
pub struct HealthRegistry {
    checks: RwLock<HashMap<String, CheckFn>>,
    ready: AtomicBool,
    ready_since: RwLock<Option<Instant>>,
    start_time: Instant,
    custom: RwLock<HashMap<String, serde_json::Value>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    #[must_use]
    pub fn new() -> Self {
        HealthRegistry {
            checks: RwLock::new(HashMap::new()),
            ready: AtomicBool::new(false),
            ready_since: RwLock::new(None),
            start_time: Instant::now(),
            custom: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_check(&self, name: &str, check: impl Fn() -> CheckResult + Send + Sync + 'static) {
        #[allow(clippy::unwrap_used)]
        self.checks
            .write()
            .unwrap()
            .insert(name.to_string(), Arc::new(check));
    }

    pub fn remove_check(&self, name: &str) {
        #[allow(clippy::unwrap_used)]
        self.checks.write().unwrap().remove(name);
    }

    pub fn set_ready(&self) {
        if !self.ready.swap(true, Ordering::SeqCst) {
            #[allow(clippy::unwrap_used)]
            let mut since = self.ready_since.write().unwrap();
            if since.is_none() {
                *since = Some(Instant::now());
            }
        }
    }

    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn set_custom(&self, key: &str, value: serde_json::Value) {
        #[allow(clippy::unwrap_used)]
        self.custom.write().unwrap().insert(key.to_string(), value);
    }

    /// Evaluate every registered check and fold them via the health
    /// lattice's minimum (worst) status.
    #[must_use]
    pub fn run(&self) -> AggregateHealth {
        #[allow(clippy::unwrap_used)]
        let checks = self.checks.read().unwrap();
        let mut results = HashMap::with_capacity(checks.len());
        let mut worst = HealthStatus::Healthy;
        for (name, check) in checks.iter() {
            let result = check();
            if result.status > worst {
                worst = result.status;
            }
            results.insert(name.clone(), result);
        }
        AggregateHealth {
            status: worst,
            ready: self.is_ready(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            checks: results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_atomic_and_independent() {
        let m = Metrics::new();
        m.record_request("GET");
        m.record_request("GET");
        m.record_request("POST");
        m.record_response();
        m.record_error();
        let snap = m.snapshot();
        assert_eq!(snap.total_requests, 3);
        assert_eq!(snap.total_responses, 1);
        assert_eq!(snap.total_errors, 1);
        assert_eq!(snap.in_flight, 2);
        assert_eq!(snap.per_method.get("GET"), Some(&2));
    }

    #[test]
    fn aggregate_status_is_min_over_lattice() {
        let reg = HealthRegistry::new();
        reg.add_check("db", CheckResult::healthy);
        reg.add_check("cache", || CheckResult {
            status: HealthStatus::Degraded,
            message: "slow".into(),
        });
        let agg = reg.run();
        assert_eq!(agg.status, HealthStatus::Degraded);

        reg.add_check("queue", || CheckResult::unhealthy("down"));
        let agg = reg.run();
        assert_eq!(agg.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn readiness_transition_is_recorded_once() {
        let reg = HealthRegistry::new();
        assert!(!reg.is_ready());
        reg.set_ready();
        assert!(reg.is_ready());
        reg.set_not_ready();
        assert!(!reg.is_ready());
        reg.set_ready();
        assert!(reg.is_ready());
    }

    #[test]
    fn empty_registry_is_healthy() {
        let reg = HealthRegistry::new();
        assert_eq!(reg.run().status, HealthStatus::Healthy);
    }
}
