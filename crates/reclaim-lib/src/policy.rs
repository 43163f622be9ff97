//! Reclaim policy resolution from priority class annotations
//!
//! A priority class opts into idle-resource reclamation through annotations:
//!
//! ```yaml
//! kind: PriorityClass
//! metadata:
//!   name: toleration-policy-sample
//!   annotations:
//!     reclaim-idle-resource.scheduling.x-k8s.io/minimum-preemptable-priority: "10000"
//!     reclaim-idle-resource.scheduling.x-k8s.io/toleration-seconds: "3600"
//!     reclaim-idle-resource.scheduling.x-k8s.io/gpu-idle-seconds: "3600"
//!     reclaim-idle-resource.scheduling.x-k8s.io/gpu-idle-usage-threshold: "0.05"
//! value: 1000
//! ```
//!
//! Absent annotations take their defaults. A malformed value rejects the
//! whole policy.

use crate::error::PolicyError;
use crate::models::ResourceType;
use crate::observability::{ReclaimMetrics, StructuredLogger};
use k8s_openapi::api::scheduling::v1::PriorityClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, PolicyError>;

/// Prefix shared by all reclaim policy annotations
pub const ANNOTATION_KEY_PREFIX: &str = "reclaim-idle-resource.scheduling.x-k8s.io/";

pub const ANNOTATION_MINIMUM_PREEMPTABLE_PRIORITY: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/minimum-preemptable-priority";
pub const ANNOTATION_TOLERATION_SECONDS: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/toleration-seconds";
pub const ANNOTATION_CPU_IDLE_SECONDS: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/cpu-idle-seconds";
pub const ANNOTATION_GPU_IDLE_SECONDS: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/gpu-idle-seconds";
pub const ANNOTATION_CPU_IDLE_USAGE_THRESHOLD: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/cpu-idle-usage-threshold";
pub const ANNOTATION_GPU_IDLE_USAGE_THRESHOLD: &str =
    "reclaim-idle-resource.scheduling.x-k8s.io/gpu-idle-usage-threshold";

/// Reclaim policy of a single priority class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    /// Lowest priority allowed to preempt this class. Defaults to the class
    /// priority + 1.
    pub minimum_preemptable_priority: i32,

    /// How long eligible preemption pressure is tolerated. Zero means no
    /// toleration; a negative value tolerates forever.
    pub toleration_seconds: i64,

    /// Averaging window for CPU idleness.
    pub cpu_idle_seconds: i64,

    /// Averaging window for GPU idleness.
    pub gpu_idle_seconds: i64,

    /// CPU usage below which the workload counts as idle.
    pub cpu_idle_usage_threshold: f64,

    /// GPU usage below which the workload counts as idle.
    pub gpu_idle_usage_threshold: f64,
}

impl Policy {
    /// Resolve a policy from an annotation map and the class priority.
    ///
    /// Fails on the first malformed annotation; no partial policy is returned.
    pub fn resolve(annotations: &BTreeMap<String, String>, priority: i32) -> Result<Self> {
        let minimum_preemptable_priority =
            match annotations.get(ANNOTATION_MINIMUM_PREEMPTABLE_PRIORITY) {
                Some(value) => parse_annotation(ANNOTATION_MINIMUM_PREEMPTABLE_PRIORITY, value)?,
                None => priority
                    .checked_add(1)
                    .ok_or(PolicyError::PriorityOverflow { priority })?,
            };

        Ok(Self {
            minimum_preemptable_priority,
            toleration_seconds: parse_or(annotations, ANNOTATION_TOLERATION_SECONDS, 0)?,
            cpu_idle_seconds: parse_or(annotations, ANNOTATION_CPU_IDLE_SECONDS, 0)?,
            gpu_idle_seconds: parse_or(annotations, ANNOTATION_GPU_IDLE_SECONDS, 0)?,
            cpu_idle_usage_threshold: parse_or(
                annotations,
                ANNOTATION_CPU_IDLE_USAGE_THRESHOLD,
                0.0,
            )?,
            gpu_idle_usage_threshold: parse_or(
                annotations,
                ANNOTATION_GPU_IDLE_USAGE_THRESHOLD,
                0.0,
            )?,
        })
    }

    /// Resolve the policy carried by a Kubernetes priority class
    pub fn from_priority_class(pc: &PriorityClass) -> Result<Self> {
        match pc.metadata.annotations.as_ref() {
            Some(annotations) => Self::resolve(annotations, pc.value),
            None => Self::resolve(&BTreeMap::new(), pc.value),
        }
    }

    pub fn idle_seconds(&self, resource: ResourceType) -> i64 {
        match resource {
            ResourceType::Cpu => self.cpu_idle_seconds,
            ResourceType::Gpu => self.gpu_idle_seconds,
        }
    }

    pub fn idle_usage_threshold(&self, resource: ResourceType) -> f64 {
        match resource {
            ResourceType::Cpu => self.cpu_idle_usage_threshold,
            ResourceType::Gpu => self.gpu_idle_usage_threshold,
        }
    }

    /// Toleration window, or `None` when pressure is tolerated forever
    pub fn toleration(&self) -> Option<Duration> {
        u64::try_from(self.toleration_seconds)
            .ok()
            .map(Duration::from_secs)
    }

    pub fn tolerates_forever(&self) -> bool {
        self.toleration_seconds < 0
    }

    /// Whether a workload at `priority` is eligible to preempt this class
    pub fn is_preemptable_by(&self, priority: i32) -> bool {
        priority >= self.minimum_preemptable_priority
    }

    /// Whether `usage` falls below the idle threshold for `resource`
    pub fn is_below_idle_threshold(&self, resource: ResourceType, usage: f64) -> bool {
        usage < self.idle_usage_threshold(resource)
    }
}

fn parse_annotation<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.parse::<T>().map_err(|e| PolicyError::Parse {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_or<T>(annotations: &BTreeMap<String, String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match annotations.get(key) {
        Some(value) => parse_annotation(key, value),
        None => Ok(default),
    }
}

/// Resolves policies for priority classes and reports the outcome
#[derive(Clone)]
pub struct PolicyResolver {
    metrics: ReclaimMetrics,
    logger: StructuredLogger,
}

impl Default for PolicyResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyResolver {
    pub fn new() -> Self {
        Self {
            metrics: ReclaimMetrics::new(),
            logger: StructuredLogger::new("policy-resolver"),
        }
    }

    pub fn resolve(&self, pc: &PriorityClass) -> Result<Policy> {
        let name = pc.metadata.name.as_deref().unwrap_or_default();
        match Policy::from_priority_class(pc) {
            Ok(policy) => {
                self.logger
                    .log_policy_resolved(name, policy.minimum_preemptable_priority);
                Ok(policy)
            }
            Err(e) => {
                self.metrics.inc_policy_parse_failures();
                self.logger.log_policy_rejected(name, &e);
                Err(e)
            }
        }
    }
}
