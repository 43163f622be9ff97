//! Usage evaluation against the metrics backend
//!
//! The pipeline runs leaf-first: resolve the backend address, execute a
//! single query with bounded timeouts, then interpret the result as a
//! scalar sample. [`UsageEvaluator`] ties the pieces together and never
//! fails; errors are reported through the observability side-channel and
//! surface as zero utilization.

mod endpoint;
mod query;
mod scalar;
mod usage;

pub use endpoint::{
    EndpointConfig, MetricsEndpointResolver, RuntimeEnvironment, ServiceDirectory,
    LOOPBACK_ADDRESS, PROMETHEUS_NAMESPACE, PROMETHEUS_SERVICE_NAME,
};
pub use query::{
    MatrixSeries, MetricsBackendConfig, QueryExecutor, QueryValue, RawSample, VectorSample,
    PROMETHEUS_PORT,
};
pub use scalar::extract_scalar;
pub use usage::{build_usage_query, UsageEvaluator};

use crate::error::MetricsError;

pub type Result<T> = std::result::Result<T, MetricsError>;
