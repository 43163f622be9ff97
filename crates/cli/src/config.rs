//! Configuration management for the CLI

use anyhow::{Context, Result};
use reclaim_lib::metrics::{PROMETHEUS_NAMESPACE, PROMETHEUS_PORT, PROMETHEUS_SERVICE_NAME};
use reclaim_lib::{EndpointConfig, MetricsBackendConfig, RuntimeEnvironment};
use serde::Deserialize;
use std::time::Duration;

/// CLI configuration, read from `RECLAIM_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Name of the Prometheus service
    #[serde(default = "default_prometheus_service")]
    pub prometheus_service: String,

    /// Namespace of the Prometheus service
    #[serde(default = "default_prometheus_namespace")]
    pub prometheus_namespace: String,

    /// Prometheus port
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,

    /// Overall bound on a single query, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Evaluation timeout hint passed to Prometheus, in seconds
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// Runtime environment, taken from `ENV`
    #[serde(skip, default = "RuntimeEnvironment::from_process_env")]
    pub environment: RuntimeEnvironment,
}

fn default_prometheus_service() -> String {
    PROMETHEUS_SERVICE_NAME.to_string()
}

fn default_prometheus_namespace() -> String {
    PROMETHEUS_NAMESPACE.to_string()
}

fn default_prometheus_port() -> u16 {
    PROMETHEUS_PORT
}

fn default_request_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    5
}

impl CliConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("RECLAIM").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse RECLAIM_* configuration")
    }

    pub fn endpoint_config(&self) -> EndpointConfig {
        EndpointConfig {
            environment: self.environment,
            service_name: self.prometheus_service.clone(),
            service_namespace: self.prometheus_namespace.clone(),
        }
    }

    pub fn backend_config(&self) -> MetricsBackendConfig {
        MetricsBackendConfig {
            port: self.prometheus_port,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            query_timeout: Duration::from_secs(self.query_timeout_secs),
        }
    }
}
