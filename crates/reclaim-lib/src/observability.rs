//! Observability infrastructure for policy resolution and usage evaluation
//!
//! Provides:
//! - Prometheus metrics (query latency, query failures, fail-open fallbacks)
//! - Structured logging with tracing for events operators need to see

use crate::error::{MetricsError, PolicyError};
use crate::models::{ResourceType, WorkloadRef};
use prometheus::{register_histogram, register_int_counter, register_int_counter_vec};
use prometheus::{Histogram, IntCounter, IntCounterVec};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

/// Histogram buckets for backend query latency (in seconds)
const QUERY_LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ReclaimMetricsInner> = OnceLock::new();

struct ReclaimMetricsInner {
    query_duration_seconds: Histogram,
    query_failures: IntCounterVec,
    usage_fallbacks: IntCounterVec,
    policy_parse_failures: IntCounter,
}

impl ReclaimMetricsInner {
    fn new() -> Self {
        Self {
            query_duration_seconds: register_histogram!(
                "reclaim_query_duration_seconds",
                "Time spent executing a query against the metrics backend",
                QUERY_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register query_duration_seconds"),

            query_failures: register_int_counter_vec!(
                "reclaim_query_failures_total",
                "Usage evaluation failures by error kind",
                &["kind"]
            )
            .expect("Failed to register query_failures"),

            usage_fallbacks: register_int_counter_vec!(
                "reclaim_usage_fallbacks_total",
                "Usage evaluations that fell back to zero utilization",
                &["resource"]
            )
            .expect("Failed to register usage_fallbacks"),

            policy_parse_failures: register_int_counter!(
                "reclaim_policy_parse_failures_total",
                "Priority classes whose reclaim policy annotations could not be parsed"
            )
            .expect("Failed to register policy_parse_failures"),
        }
    }
}

/// Handle to the process-wide reclaim metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct ReclaimMetrics {
    _private: (),
}

impl Default for ReclaimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReclaimMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ReclaimMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ReclaimMetricsInner {
        GLOBAL_METRICS.get_or_init(ReclaimMetricsInner::new)
    }

    pub fn observe_query_duration(&self, duration_secs: f64) {
        self.inner().query_duration_seconds.observe(duration_secs);
    }

    pub fn inc_query_failures(&self, error: &MetricsError) {
        self.inner()
            .query_failures
            .with_label_values(&[error.kind()])
            .inc();
    }

    pub fn inc_usage_fallbacks(&self, resource: ResourceType) {
        self.inner()
            .usage_fallbacks
            .with_label_values(&[resource.as_str()])
            .inc();
    }

    pub fn inc_policy_parse_failures(&self) {
        self.inner().policy_parse_failures.inc();
    }

    pub fn query_failures(&self, kind: &str) -> u64 {
        self.inner().query_failures.with_label_values(&[kind]).get()
    }

    pub fn usage_fallbacks(&self, resource: ResourceType) -> u64 {
        self.inner()
            .usage_fallbacks
            .with_label_values(&[resource.as_str()])
            .get()
    }
}

/// Structured logger for reclaim events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    /// Log a query expression before it is sent to the backend
    pub fn log_query(&self, resource: ResourceType, workload: &WorkloadRef, query: &str) {
        debug!(
            event = "usage_query",
            component = %self.component,
            resource = %resource,
            pod_name = %workload.pod_name,
            namespace = %workload.namespace,
            query = %query,
            "Built usage query"
        );
    }

    /// Log a usage evaluation that returned zero because the backend failed
    pub fn log_usage_fallback(
        &self,
        resource: ResourceType,
        workload: &WorkloadRef,
        error: &MetricsError,
    ) {
        warn!(
            event = "usage_fallback",
            component = %self.component,
            resource = %resource,
            pod_name = %workload.pod_name,
            namespace = %workload.namespace,
            error_kind = error.kind(),
            error = %error,
            "Metrics unavailable, reporting zero utilization"
        );
    }

    /// Log a successfully resolved policy
    pub fn log_policy_resolved(&self, priority_class: &str, minimum_preemptable_priority: i32) {
        info!(
            event = "policy_resolved",
            component = %self.component,
            priority_class = %priority_class,
            minimum_preemptable_priority = minimum_preemptable_priority,
            "Resolved reclaim policy"
        );
    }

    /// Log a priority class whose annotations were rejected
    pub fn log_policy_rejected(&self, priority_class: &str, error: &PolicyError) {
        warn!(
            event = "policy_rejected",
            component = %self.component,
            priority_class = %priority_class,
            error = %error,
            "Rejected reclaim policy annotations"
        );
    }
}
