//! Metrics backend address resolution
//!
//! In development the backend is expected on the loopback interface
//! (typically via `kubectl port-forward`). Everywhere else the address is the
//! cluster IP of the well-known Prometheus service.

use super::Result;
use crate::error::MetricsError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Service;
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Name of the Prometheus service queried for usage
pub const PROMETHEUS_SERVICE_NAME: &str = "prometheus-kube-prometheus-prometheus";

/// Namespace the Prometheus service is installed in
pub const PROMETHEUS_NAMESPACE: &str = "prometheus";

/// Backend address used in development mode
pub const LOOPBACK_ADDRESS: &str = "localhost";

/// Execution environment the process was started in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    #[default]
    Production,
    /// Local builds; the backend is reached on the loopback address
    Development,
    /// Test harnesses; resolves like production
    Testing,
}

impl RuntimeEnvironment {
    /// Environment variable carrying the runtime environment
    pub const ENV_VAR: &'static str = "ENV";

    /// Interpret a raw `ENV` value. Unknown or missing values mean production.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some("development") => RuntimeEnvironment::Development,
            Some("testing") => RuntimeEnvironment::Testing,
            _ => RuntimeEnvironment::Production,
        }
    }

    /// Read the runtime environment from the process environment
    pub fn from_process_env() -> Self {
        Self::from_value(std::env::var(Self::ENV_VAR).ok().as_deref())
    }

    pub fn is_development(&self) -> bool {
        matches!(self, RuntimeEnvironment::Development)
    }
}

/// Configuration for [`MetricsEndpointResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub environment: RuntimeEnvironment,
    pub service_name: String,
    pub service_namespace: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            environment: RuntimeEnvironment::Production,
            service_name: PROMETHEUS_SERVICE_NAME.to_string(),
            service_namespace: PROMETHEUS_NAMESPACE.to_string(),
        }
    }
}

impl EndpointConfig {
    pub fn with_environment(environment: RuntimeEnvironment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }
}

/// Platform service directory used to look up the backend address
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// Return the cluster-internal IP of service `name` in `namespace`
    async fn service_cluster_ip(&self, namespace: &str, name: &str) -> Result<String>;
}

#[async_trait]
impl ServiceDirectory for kube::Client {
    async fn service_cluster_ip(&self, namespace: &str, name: &str) -> Result<String> {
        let api: Api<Service> = Api::namespaced(self.clone(), namespace);
        let service = api
            .get(name)
            .await
            .map_err(|e| lookup_error(namespace, name, e.to_string()))?;

        // Headless services report the literal "None"
        service
            .spec
            .and_then(|spec| spec.cluster_ip)
            .filter(|ip| !ip.is_empty() && ip != "None")
            .ok_or_else(|| lookup_error(namespace, name, "service has no cluster IP"))
    }
}

fn lookup_error(namespace: &str, name: &str, reason: impl Into<String>) -> MetricsError {
    MetricsError::Lookup {
        namespace: namespace.to_string(),
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Resolves the network address of the metrics backend
pub struct MetricsEndpointResolver<D> {
    config: EndpointConfig,
    directory: D,
}

impl<D: ServiceDirectory> MetricsEndpointResolver<D> {
    pub fn new(config: EndpointConfig, directory: D) -> Self {
        Self { config, directory }
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Resolve the backend address. Lookup failures are not retried.
    pub async fn resolve(&self) -> Result<String> {
        if self.config.environment.is_development() {
            debug!(address = LOOPBACK_ADDRESS, "Development mode, using loopback backend");
            return Ok(LOOPBACK_ADDRESS.to_string());
        }

        let address = self
            .directory
            .service_cluster_ip(&self.config.service_namespace, &self.config.service_name)
            .await
            .inspect_err(|e| {
                error!(
                    service = %self.config.service_name,
                    namespace = %self.config.service_namespace,
                    error = %e,
                    "Couldn't fetch metrics backend service IP"
                );
            })?;

        debug!(address = %address, "Resolved metrics backend address");
        Ok(address)
    }
}
