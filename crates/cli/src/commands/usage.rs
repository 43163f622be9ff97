//! Usage and idleness CLI commands

use anyhow::{Context, Result};
use kube::Client;
use reclaim_lib::{
    MetricsEndpointResolver, Policy, ResourceType, ServiceDirectory, UsageEvaluator, WorkloadRef,
};
use serde::Serialize;
use tabled::Tabled;

use crate::commands::policy::resolve_policy;
use crate::output::{
    color_idle, format_seconds, format_usage, print_info, print_json, print_table, print_warning,
    OutputFormat,
};

/// Row for the idleness table
#[derive(Tabled)]
struct IdleRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Window")]
    window: String,
    #[tabled(rename = "Usage")]
    usage: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Status")]
    status: String,
}

#[derive(Debug, Serialize)]
struct UsageReport<'a> {
    workload: &'a WorkloadRef,
    resource: ResourceType,
    window_seconds: i64,
    value: f64,
    timestamp: f64,
}

/// Idleness of one resource under a policy. `usage` is `None` when the
/// policy has no idle window for the resource.
#[derive(Debug, Serialize)]
struct IdleCheck {
    resource: ResourceType,
    window_seconds: i64,
    threshold: f64,
    usage: Option<f64>,
    idle: Option<bool>,
}

/// Show the average usage of a workload over a window
pub async fn show_usage<D: ServiceDirectory>(
    resolver: &MetricsEndpointResolver<D>,
    evaluator: &UsageEvaluator,
    workload: &WorkloadRef,
    resource: ResourceType,
    window_seconds: i64,
    format: OutputFormat,
) -> Result<()> {
    let address = resolver
        .resolve()
        .await
        .context("Failed to resolve metrics backend address")?;

    let sample = evaluator
        .try_average_usage(resource, workload, &address, window_seconds)
        .await
        .with_context(|| format!("Failed to evaluate {resource} usage of {workload}"))?;

    match format {
        OutputFormat::Json => print_json(&UsageReport {
            workload,
            resource,
            window_seconds,
            value: sample.value,
            timestamp: sample.timestamp,
        })?,
        OutputFormat::Table => {
            let evaluated_at = chrono::DateTime::from_timestamp_millis(sample.timestamp as i64)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| sample.timestamp.to_string());

            print_info(&format!(
                "{} usage of {} over {}: {} (evaluated at {})",
                resource.as_str().to_uppercase(),
                workload,
                format_seconds(window_seconds),
                format_usage(sample.value),
                evaluated_at
            ));
        }
    }

    Ok(())
}

/// Check whether a workload is idle under the policy of a priority class
pub async fn check_idle<D: ServiceDirectory>(
    client: &Client,
    resolver: &MetricsEndpointResolver<D>,
    evaluator: &UsageEvaluator,
    workload: &WorkloadRef,
    priority_class: &str,
    format: OutputFormat,
) -> Result<()> {
    let (_, policy) = resolve_policy(client, priority_class).await?;

    let address = resolver
        .resolve()
        .await
        .context("Failed to resolve metrics backend address")?;

    let mut checks = Vec::new();
    for resource in ResourceType::all() {
        checks.push(check_resource(&policy, evaluator, workload, &address, resource).await);
    }

    match format {
        OutputFormat::Json => print_json(&checks)?,
        OutputFormat::Table => {
            print_info(&format!(
                "Idleness of {workload} under priority class {priority_class}"
            ));
            print_table(checks.iter().map(idle_row).collect());
            if policy.tolerates_forever() {
                print_warning("Policy tolerates preemption forever");
            }
        }
    }

    Ok(())
}

async fn check_resource(
    policy: &Policy,
    evaluator: &UsageEvaluator,
    workload: &WorkloadRef,
    address: &str,
    resource: ResourceType,
) -> IdleCheck {
    let window_seconds = policy.idle_seconds(resource);
    let threshold = policy.idle_usage_threshold(resource);

    if window_seconds <= 0 {
        return IdleCheck {
            resource,
            window_seconds,
            threshold,
            usage: None,
            idle: None,
        };
    }

    let usage = evaluator
        .average_usage(resource, workload, address, window_seconds)
        .await;

    IdleCheck {
        resource,
        window_seconds,
        threshold,
        usage: Some(usage),
        idle: Some(policy.is_below_idle_threshold(resource, usage)),
    }
}

fn idle_row(check: &IdleCheck) -> IdleRow {
    IdleRow {
        resource: check.resource.to_string(),
        window: format_seconds(check.window_seconds),
        usage: check.usage.map(format_usage).unwrap_or_else(|| "-".to_string()),
        threshold: check.threshold.to_string(),
        status: check
            .idle
            .map(color_idle)
            .unwrap_or_else(|| "disabled".to_string()),
    }
}
