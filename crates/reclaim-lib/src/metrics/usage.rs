//! Averaged CPU/GPU utilization of a workload

use super::query::QueryExecutor;
use super::scalar::extract_scalar;
use super::Result;
use crate::models::{ResourceType, ResourceUsageSample, WorkloadRef};
use crate::observability::{ReclaimMetrics, StructuredLogger};
use tracing::debug;

/// Build the averaged-usage query for `workload` over the last `window_secs`
pub fn build_usage_query(resource: ResourceType, workload: &WorkloadRef, window_secs: i64) -> String {
    let window = format!("{window_secs}s");
    match resource {
        ResourceType::Gpu => format!(
            r#"scalar(avg_over_time(DCGM_FI_PROF_GR_ENGINE_ACTIVE{{exported_pod="{}", exported_namespace="{}"}}[{}]))"#,
            workload.pod_name, workload.namespace, window
        ),
        ResourceType::Cpu => format!(
            r#"scalar(sum(rate(container_cpu_usage_seconds_total{{pod="{}",namespace="{}",container!=""}}[{}])) by (pod_name))"#,
            workload.pod_name, workload.namespace, window
        ),
    }
}

/// Evaluates average resource utilization of a workload.
///
/// [`UsageEvaluator::average_usage`] fails open: a backend outage yields
/// zero utilization so scheduling never blocks on metrics. The underlying
/// error is logged and counted in `reclaim_usage_fallbacks_total`.
#[derive(Clone)]
pub struct UsageEvaluator {
    executor: QueryExecutor,
    metrics: ReclaimMetrics,
    logger: StructuredLogger,
}

impl Default for UsageEvaluator {
    fn default() -> Self {
        Self::new(QueryExecutor::default())
    }
}

impl UsageEvaluator {
    pub fn new(executor: QueryExecutor) -> Self {
        Self {
            executor,
            metrics: ReclaimMetrics::new(),
            logger: StructuredLogger::new("usage-evaluator"),
        }
    }

    /// Average utilization over the window, or the error that prevented it
    pub async fn try_average_usage(
        &self,
        resource: ResourceType,
        workload: &WorkloadRef,
        address: &str,
        window_secs: i64,
    ) -> Result<ResourceUsageSample> {
        let query = build_usage_query(resource, workload, window_secs);
        self.logger.log_query(resource, workload, &query);

        let result = self.executor.execute(address, &query).await?;
        let sample = extract_scalar(&result)?;

        debug!(
            resource = %resource,
            workload = %workload,
            value = sample.value,
            timestamp = sample.timestamp,
            "Evaluated average usage"
        );
        Ok(sample)
    }

    /// Average utilization over the window; zero when it cannot be measured
    pub async fn average_usage(
        &self,
        resource: ResourceType,
        workload: &WorkloadRef,
        address: &str,
        window_secs: i64,
    ) -> f64 {
        match self
            .try_average_usage(resource, workload, address, window_secs)
            .await
        {
            Ok(sample) => sample.value,
            Err(e) => {
                self.metrics.inc_query_failures(&e);
                self.metrics.inc_usage_fallbacks(resource);
                self.logger.log_usage_fallback(resource, workload, &e);
                0.0
            }
        }
    }
}
