//! Scalar interpretation of instant query results

use super::query::{QueryValue, RawSample};
use super::Result;
use crate::error::MetricsError;
use crate::models::ResourceUsageSample;

/// Interpret a query result as a single scalar sample.
///
/// Non-finite values (the backend reports `NaN` for empty windows) become
/// `0.0`. The evaluation timestamp is kept, converted from the wire's
/// fractional unix seconds to epoch milliseconds.
pub fn extract_scalar(value: &QueryValue) -> Result<ResourceUsageSample> {
    let RawSample(timestamp, raw) = match value {
        QueryValue::Scalar(sample) => sample,
        other => {
            return Err(MetricsError::Type {
                expected: "scalar",
                actual: other.type_name().to_string(),
            })
        }
    };

    let parsed: f64 = raw.parse().map_err(|_| MetricsError::Type {
        expected: "numeric scalar",
        actual: format!("{raw:?}"),
    })?;

    Ok(ResourceUsageSample {
        value: if parsed.is_finite() { parsed } else { 0.0 },
        timestamp: (timestamp * 1000.0).round(),
    })
}
