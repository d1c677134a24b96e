//! Drives one or two reconcilers and aggregates their readiness.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use flock_core::ReadySignal;

use crate::reconciler::Reconciler;

/// Owns the process's reconcilers and runs them concurrently until
/// shutdown. Reconcilers are independent; the supervisor only fans out
/// cancellation and collects ready signals.
#[derive(Default)]
pub struct Supervisor {
    reconcilers: Vec<Reconciler>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, reconciler: Reconciler) {
        self.reconcilers.push(reconciler);
    }

    /// Ready signals of every managed reconciler, in insertion order.
    /// Composite readiness is the logical AND of all of them.
    pub fn ready_signals(&self) -> Vec<ReadySignal> {
        self.reconcilers.iter().map(|r| r.ready()).collect()
    }

    /// True once every reconciler has completed a successful cycle.
    pub fn is_ready(&self) -> bool {
        self.reconcilers.iter().all(|r| r.ready().is_ready())
    }

    /// Run every reconciler until `shutdown` fires, then wait for all of
    /// them to stop.
    pub async fn run(self, shutdown: watch::Receiver<bool>) {
        info!(reconcilers = self.reconcilers.len(), "supervisor starting");

        let handles: Vec<(String, JoinHandle<()>)> = self
            .reconcilers
            .into_iter()
            .map(|mut reconciler| {
                let name = reconciler.name().to_string();
                let shutdown = shutdown.clone();
                let handle = tokio::spawn(async move { reconciler.run(shutdown).await });
                (name, handle)
            })
            .collect();

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!(service = %name, error = %e, "reconciler task failed");
            }
        }

        info!("supervisor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use flock_core::{
        AgentInfo, JobServiceClient, PendingCounts, PoolStatus, ReconcilerConfig, RuntimeClient,
        ScaleResult, ServiceStatus, TaskInfo,
    };

    struct QuietJobs {
        fail: bool,
    }

    #[async_trait]
    impl JobServiceClient for QuietJobs {
        async fn pool_status(&self) -> ScaleResult<PoolStatus> {
            if self.fail {
                return Err(flock_core::ScaleError::JobServiceRead("down".to_string()));
            }
            Ok(PoolStatus::default())
        }

        async fn pending_jobs(&self) -> ScaleResult<u32> {
            Ok(0)
        }

        async fn pending_by_kind(&self) -> ScaleResult<PendingCounts> {
            Ok(PendingCounts::default())
        }

        async fn agent_details(&self) -> ScaleResult<Vec<AgentInfo>> {
            Ok(Vec::new())
        }
    }

    struct QuietRuntime;

    #[async_trait]
    impl RuntimeClient for QuietRuntime {
        async fn service_status(&self) -> ScaleResult<ServiceStatus> {
            Ok(ServiceStatus::default())
        }

        async fn set_desired(&self, _count: u32) -> ScaleResult<()> {
            Ok(())
        }

        async fn task_ips(&self) -> ScaleResult<Vec<TaskInfo>> {
            Ok(Vec::new())
        }

        async fn set_protection(
            &self,
            _handles: &[String],
            _enabled: bool,
            _ttl_minutes: u32,
        ) -> ScaleResult<()> {
            Ok(())
        }
    }

    fn reconciler(name: &str, fail: bool) -> Reconciler {
        let config = ReconcilerConfig::new(name, 0, 10)
            .with_poll_interval(Duration::from_millis(20));
        Reconciler::new(
            config,
            Arc::new(QuietJobs { fail }),
            Arc::new(QuietRuntime),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn runs_two_reconcilers_and_stops_on_shutdown() {
        let mut supervisor = Supervisor::new();
        supervisor.add(reconciler("regular", false));
        supervisor.add(reconciler("spot", false));

        let mut signals = supervisor.ready_signals();
        assert_eq!(signals.len(), 2);
        assert!(!supervisor.is_ready());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervisor.run(shutdown_rx));

        for signal in &mut signals {
            tokio::time::timeout(Duration::from_secs(2), signal.wait())
                .await
                .expect("reconciler never became ready");
        }

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("supervisor did not stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn composite_readiness_requires_every_reconciler() {
        let mut supervisor = Supervisor::new();
        supervisor.add(reconciler("healthy", false));
        supervisor.add(reconciler("failing", true));

        let signals = supervisor.ready_signals();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervisor.run(shutdown_rx));

        tokio::time::sleep(Duration::from_millis(100)).await;

        // The healthy reconciler latched, the failing one never does.
        assert!(signals[0].is_ready());
        assert!(!signals[1].is_ready());
        assert!(!signals.iter().all(|s| s.is_ready()));

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("supervisor did not stop on shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn empty_supervisor_is_trivially_ready_and_stops() {
        let supervisor = Supervisor::new();
        assert!(supervisor.is_ready());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(supervisor.run(shutdown_rx));
        // With nothing to supervise, run returns without waiting for this.
        let _ = shutdown_tx.send(true);

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("supervisor did not stop")
            .unwrap();
    }
}
