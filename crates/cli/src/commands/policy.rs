//! Policy-related CLI commands

use anyhow::Result;
use kube::Client;
use reclaim_lib::{Policy, PolicyResolver};
use serde::Serialize;
use tabled::Tabled;

use crate::cluster::get_priority_class;
use crate::output::{format_seconds, print_info, print_json, print_table, OutputFormat};

/// Row for the policy table
#[derive(Tabled)]
struct PolicyRow {
    #[tabled(rename = "Setting")]
    setting: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Serialize)]
struct PolicyReport<'a> {
    priority_class: &'a str,
    priority: i32,
    policy: &'a Policy,
}

/// Fetch a priority class and resolve its reclaim policy
pub async fn resolve_policy(client: &Client, name: &str) -> Result<(i32, Policy)> {
    let pc = get_priority_class(client, name).await?;
    let policy = PolicyResolver::new().resolve(&pc)?;
    Ok((pc.value, policy))
}

/// Show the reclaim policy of a priority class
pub async fn show_policy(client: &Client, name: &str, format: OutputFormat) -> Result<()> {
    let (priority, policy) = resolve_policy(client, name).await?;

    match format {
        OutputFormat::Json => print_json(&PolicyReport {
            priority_class: name,
            priority,
            policy: &policy,
        })?,
        OutputFormat::Table => {
            print_info(&format!("Priority class {name} (priority {priority})"));
            print_table(policy_rows(&policy));
        }
    }

    Ok(())
}

fn policy_rows(policy: &Policy) -> Vec<PolicyRow> {
    vec![
        PolicyRow {
            setting: "Minimum preemptable priority",
            value: policy.minimum_preemptable_priority.to_string(),
        },
        PolicyRow {
            setting: "Toleration",
            value: format_seconds(policy.toleration_seconds),
        },
        PolicyRow {
            setting: "CPU idle window",
            value: format_seconds(policy.cpu_idle_seconds),
        },
        PolicyRow {
            setting: "CPU idle threshold",
            value: policy.cpu_idle_usage_threshold.to_string(),
        },
        PolicyRow {
            setting: "GPU idle window",
            value: format_seconds(policy.gpu_idle_seconds),
        },
        PolicyRow {
            setting: "GPU idle threshold",
            value: policy.gpu_idle_usage_threshold.to_string(),
        },
    ]
}
