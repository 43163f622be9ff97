//! Reclaim Idle Resource CLI
//!
//! A command-line tool for inspecting priority class reclaim policies and
//! the usage measurements an idle-resource preemption decision is based on.

mod cluster;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{policy, usage};
use reclaim_lib::{MetricsEndpointResolver, QueryExecutor, ResourceType, UsageEvaluator, WorkloadRef};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Reclaim Idle Resource CLI
#[derive(Parser)]
#[command(name = "reclaimctl")]
#[command(author, version, about = "CLI for Reclaim Idle Resource policies", long_about = None)]
pub struct Cli {
    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the reclaim policy of a priority class
    Policy {
        /// Priority class name
        priority_class: String,
    },

    /// Show the average usage of a pod over a window
    Usage {
        /// Pod name
        #[arg(long)]
        pod: String,

        /// Pod namespace
        #[arg(long, short, default_value = "default")]
        namespace: String,

        /// Resource to measure (cpu, gpu)
        #[arg(long, default_value = "gpu")]
        resource: ResourceType,

        /// Averaging window in seconds
        #[arg(long, default_value_t = 300)]
        window: i64,
    },

    /// Check whether a pod is idle under a priority class policy
    Check {
        /// Pod name
        #[arg(long)]
        pod: String,

        /// Pod namespace
        #[arg(long, short, default_value = "default")]
        namespace: String,

        /// Priority class whose policy applies
        #[arg(long)]
        priority_class: String,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    // Load configuration
    let config = config::CliConfig::load()?;
    debug!(environment = ?config.environment, "Configuration loaded");

    let resolver = MetricsEndpointResolver::new(
        config.endpoint_config(),
        cluster::ClusterDirectory::new(cli.kubeconfig.clone()),
    );
    let evaluator = UsageEvaluator::new(QueryExecutor::new(config.backend_config()));

    // Execute command
    match cli.command {
        Commands::Policy { priority_class } => {
            let client = cluster::init_kube_client(cli.kubeconfig.as_ref()).await?;
            policy::show_policy(&client, &priority_class, cli.format).await?;
        }
        Commands::Usage {
            pod,
            namespace,
            resource,
            window,
        } => {
            let workload = WorkloadRef::new(pod, namespace);
            usage::show_usage(&resolver, &evaluator, &workload, resource, window, cli.format)
                .await?;
        }
        Commands::Check {
            pod,
            namespace,
            priority_class,
        } => {
            let client = cluster::init_kube_client(cli.kubeconfig.as_ref()).await?;
            let workload = WorkloadRef::new(pod, namespace);
            usage::check_idle(
                &client,
                &resolver,
                &evaluator,
                &workload,
                &priority_class,
                cli.format,
            )
            .await?;
        }
    }

    Ok(())
}
