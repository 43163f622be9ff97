//! Core data models shared by the policy and usage pipelines

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Resource kinds that can be reclaimed when idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Cpu,
    Gpu,
}

impl ResourceType {
    /// Lowercase label used in queries, metrics and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Cpu => "cpu",
            ResourceType::Gpu => "gpu",
        }
    }

    /// All resource types, in evaluation order
    pub fn all() -> [ResourceType; 2] {
        [ResourceType::Cpu, ResourceType::Gpu]
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cpu" => Ok(ResourceType::Cpu),
            "gpu" => Ok(ResourceType::Gpu),
            other => Err(format!("unknown resource type: {other}")),
        }
    }
}

/// A single scalar sample returned by the metrics backend.
///
/// `value` is always finite; `timestamp` is the evaluation time reported by
/// the backend, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceUsageSample {
    pub value: f64,
    pub timestamp: f64,
}

/// Identity of the workload whose usage is measured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRef {
    pub pod_name: String,
    pub namespace: String,
}

impl WorkloadRef {
    pub fn new(pod_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            pod_name: pod_name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)
    }
}
