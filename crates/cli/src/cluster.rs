//! Kubernetes access for the CLI

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::scheduling::v1::PriorityClass;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use reclaim_lib::{MetricsError, ServiceDirectory};
use std::path::PathBuf;

/// Build a Kubernetes client from an explicit kubeconfig, or the default
/// in-cluster / `~/.kube/config` resolution.
pub async fn init_kube_client(kubeconfig: Option<&PathBuf>) -> Result<Client> {
    match kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig file: {}", path.display()))?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| {
                    format!("Failed to create config from kubeconfig: {}", path.display())
                })?;
            Client::try_from(config)
                .context("Failed to create Kubernetes client from custom kubeconfig")
        }
        None => Client::try_default()
            .await
            .context("Failed to create Kubernetes client"),
    }
}

/// Fetch a cluster-scoped priority class by name
pub async fn get_priority_class(client: &Client, name: &str) -> Result<PriorityClass> {
    let api: Api<PriorityClass> = Api::all(client.clone());
    api.get(name)
        .await
        .with_context(|| format!("Failed to fetch priority class {name}"))
}

/// Service directory that connects to the cluster only when a lookup is made,
/// so development mode works without a kubeconfig.
///
/// A new Kubernetes client is built on every lookup; suited to one-shot CLI
/// commands, not to lookups in a loop.
pub struct ClusterDirectory {
    kubeconfig: Option<PathBuf>,
}

impl ClusterDirectory {
    pub fn new(kubeconfig: Option<PathBuf>) -> Self {
        Self { kubeconfig }
    }
}

#[async_trait]
impl ServiceDirectory for ClusterDirectory {
    async fn service_cluster_ip(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<String, MetricsError> {
        let client = init_kube_client(self.kubeconfig.as_ref())
            .await
            .map_err(|e| MetricsError::Lookup {
                namespace: namespace.to_string(),
                name: name.to_string(),
                reason: format!("{e:#}"),
            })?;

        client.service_cluster_ip(namespace, name).await
    }
}
