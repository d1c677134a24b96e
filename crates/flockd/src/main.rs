//! flockd — the flock autoscaler daemon.
//!
//! Sizes one or two container-runtime worker services to match the
//! pending workload of a job-queue agent pool. Every flag can also be
//! set through its environment variable.
//!
//! # Usage
//!
//! ```text
//! flockd --queue-token ... --queue-pool-id pool-1 \
//!        --runtime-address https://runtime.internal \
//!        --runtime-cluster prod --runtime-service workers
//! ```
//!
//! Naming a second service with `--runtime-spot-service` switches to
//! dual-service mode: the primary service takes apply-like jobs, the
//! spot service takes plan-like jobs, and each gets its own reconciler
//! over a filtered view of the shared agent pool.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};

use flock_core::{parse_duration, JobKind, ReconcilerConfig, RuntimeClient};
use flock_health::{CompositeProbe, HealthServer};
use flock_metrics::MetricsRegistry;
use flock_queue::QueueClient;
use flock_runtime::RuntimeApiClient;
use flock_scaler::{runtime_task_ips, Reconciler, ServiceView, Supervisor};

#[derive(Parser)]
#[command(name = "flockd", about = "Worker-pool autoscaler")]
struct Cli {
    /// Job-queue service base URL.
    #[arg(long, env = "QUEUE_ADDRESS", default_value = "https://queue.example.com")]
    queue_address: String,

    /// Job-queue API token.
    #[arg(long, env = "QUEUE_TOKEN", hide_env_values = true)]
    queue_token: String,

    /// Agent pool to observe.
    #[arg(long, env = "QUEUE_POOL_ID")]
    queue_pool_id: String,

    /// Container-runtime control API base URL.
    #[arg(long, env = "RUNTIME_ADDRESS")]
    runtime_address: String,

    /// Runtime cluster name.
    #[arg(long, env = "RUNTIME_CLUSTER")]
    runtime_cluster: String,

    /// Runtime service running the worker containers.
    #[arg(long, env = "RUNTIME_SERVICE")]
    runtime_service: String,

    /// Second worker service for plan-like jobs (enables dual-service mode).
    #[arg(long, env = "RUNTIME_SPOT_SERVICE")]
    runtime_spot_service: Option<String>,

    /// Lower bound on the worker count.
    #[arg(long, env = "MIN_AGENTS", default_value_t = 0)]
    min_agents: u32,

    /// Upper bound on the worker count.
    #[arg(long, env = "MAX_AGENTS", default_value_t = 10)]
    max_agents: u32,

    /// Lower bound for the spot service.
    #[arg(long, env = "SPOT_MIN_AGENTS", default_value_t = 0)]
    spot_min_agents: u32,

    /// Upper bound for the spot service.
    #[arg(long, env = "SPOT_MAX_AGENTS", default_value_t = 10)]
    spot_max_agents: u32,

    /// Reconcile interval, e.g. "10s" or "1m".
    #[arg(long, env = "POLL_INTERVAL", default_value = "10s")]
    poll_interval: String,

    /// Minimum wall time between scale-downs, e.g. "60s".
    #[arg(long, env = "COOLDOWN_PERIOD", default_value = "60s")]
    cooldown: String,

    /// TTL for task termination protection, in minutes.
    #[arg(long, env = "PROTECTION_TTL_MINUTES", default_value_t = 120)]
    protection_ttl_minutes: u32,

    /// Health and metrics listen address.
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    health_addr: SocketAddr,
}

impl Cli {
    fn reconciler_config(&self, name: &str, min: u32, max: u32) -> anyhow::Result<ReconcilerConfig> {
        let poll_interval = parse_duration(&self.poll_interval)
            .with_context(|| format!("invalid poll interval {:?}", self.poll_interval))?;
        let cooldown = parse_duration(&self.cooldown)
            .with_context(|| format!("invalid cooldown {:?}", self.cooldown))?;

        Ok(ReconcilerConfig::new(name, min, max)
            .with_poll_interval(poll_interval)
            .with_cooldown(cooldown)
            .with_protection_ttl(self.protection_ttl_minutes))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flockd=debug,flock=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let queue = Arc::new(QueueClient::new(
        &cli.queue_address,
        &cli.queue_token,
        &cli.queue_pool_id,
    )?);
    let metrics = Arc::new(MetricsRegistry::new());

    let mut supervisor = Supervisor::new();

    match cli.runtime_spot_service.as_deref() {
        None => {
            let runtime: Arc<dyn RuntimeClient> = Arc::new(RuntimeApiClient::new(
                &cli.runtime_address,
                &cli.runtime_cluster,
                &cli.runtime_service,
            )?);

            let reconciler = Reconciler::new(
                cli.reconciler_config("default", cli.min_agents, cli.max_agents)?,
                queue.clone(),
                runtime,
            )?
            .with_metrics(metrics.for_service("default"));
            supervisor.add(reconciler);

            info!(service = %cli.runtime_service, "running in single-service mode");
        }
        Some(spot_service) => {
            let regular_runtime: Arc<dyn RuntimeClient> = Arc::new(RuntimeApiClient::new(
                &cli.runtime_address,
                &cli.runtime_cluster,
                &cli.runtime_service,
            )?);
            let spot_runtime: Arc<dyn RuntimeClient> = Arc::new(RuntimeApiClient::new(
                &cli.runtime_address,
                &cli.runtime_cluster,
                spot_service,
            )?);

            // Both reconcilers read the same agent pool; each sees only
            // the agents running on its own service's tasks.
            let regular_view = ServiceView::new(
                queue.clone(),
                JobKind::Apply,
                runtime_task_ips(regular_runtime.clone()),
            );
            let spot_view = ServiceView::new(
                queue.clone(),
                JobKind::Plan,
                runtime_task_ips(spot_runtime.clone()),
            );

            let regular = Reconciler::new(
                cli.reconciler_config("regular", cli.min_agents, cli.max_agents)?,
                Arc::new(regular_view),
                regular_runtime,
            )?
            .with_metrics(metrics.for_service("regular"));
            supervisor.add(regular);

            let spot = Reconciler::new(
                cli.reconciler_config("spot", cli.spot_min_agents, cli.spot_max_agents)?,
                Arc::new(spot_view),
                spot_runtime,
            )?
            .with_metrics(metrics.for_service("spot"));
            supervisor.add(spot);

            info!(
                regular = %cli.runtime_service,
                spot = %spot_service,
                "running in dual-service mode"
            );
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let probe = Arc::new(CompositeProbe::of_signals(supervisor.ready_signals()));
    let health = HealthServer::new(cli.health_addr, probe).with_metrics(metrics.clone());
    let health_shutdown = shutdown_rx.clone();
    let health_handle = tokio::spawn(async move {
        if let Err(e) = health.run(health_shutdown).await {
            error!(error = %e, "health server error");
        }
    });

    let supervisor_handle = tokio::spawn(supervisor.run(shutdown_rx));

    shutdown_signal().await;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = supervisor_handle.await;
    let _ = health_handle.await;

    info!("autoscaler stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
