//! Idle resource reclamation building blocks
//!
//! This crate provides the decision inputs a preemption-aware scheduler
//! needs to reclaim idle CPU/GPU capacity:
//! - Reclaim policy resolution from priority class annotations
//! - Metrics backend discovery
//! - Averaged CPU/GPU utilization queries with fail-open evaluation
//! - Observability for query failures and fallbacks
//!
//! It never evicts anything itself.

pub mod error;
pub mod metrics;
pub mod models;
pub mod observability;
pub mod policy;

pub use error::{MetricsError, PolicyError};
pub use metrics::{
    EndpointConfig, MetricsBackendConfig, MetricsEndpointResolver, QueryExecutor,
    RuntimeEnvironment, ServiceDirectory, UsageEvaluator,
};
pub use models::*;
pub use observability::{ReclaimMetrics, StructuredLogger};
pub use policy::{Policy, PolicyResolver};
