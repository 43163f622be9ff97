//! Error types for policy resolution and usage evaluation

use thiserror::Error;

/// Errors raised while resolving a policy from priority class annotations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// An annotation is present but its value is not a valid number.
    #[error("invalid value {value:?} for annotation {key}: {reason}")]
    Parse {
        /// Full annotation key.
        key: String,
        /// Raw annotation value.
        value: String,
        /// Parser error message.
        reason: String,
    },

    /// The default minimum preemptable priority (`priority + 1`) does not fit in an i32.
    #[error("priority {priority} has no successor; set the minimum preemptable priority explicitly")]
    PriorityOverflow {
        /// The priority class value.
        priority: i32,
    },
}

/// Errors raised by the metrics backend pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    /// The metrics backend service could not be resolved.
    #[error("failed to resolve service {namespace}/{name}: {reason}")]
    Lookup {
        namespace: String,
        name: String,
        reason: String,
    },

    /// A backend client could not be built for the address.
    #[error("invalid metrics backend address {address:?}: {reason}")]
    Client { address: String, reason: String },

    /// The query failed or the backend reported warnings.
    #[error("query failed: {reason}")]
    Query { reason: String },

    /// The query result had an unexpected shape.
    #[error("unexpected result type: expected {expected}, got {actual}")]
    Type {
        expected: &'static str,
        actual: String,
    },
}

impl MetricsError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            MetricsError::Lookup { .. } => "lookup",
            MetricsError::Client { .. } => "client",
            MetricsError::Query { .. } => "query",
            MetricsError::Type { .. } => "type",
        }
    }

    pub(crate) fn query(reason: impl Into<String>) -> Self {
        MetricsError::Query {
            reason: reason.into(),
        }
    }
}
