//! Per-service narrowing of a shared job-service client.
//!
//! In dual-service mode both reconcilers read the same agent pool, but
//! each manages its own runtime service. A `ServiceView` restricts what
//! one reconciler sees to the agents running on its service's tasks
//! (matched by private IP) and to its slice of the pending queue.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use flock_core::{
    AgentInfo, AgentStatus, JobKind, JobServiceClient, PendingCounts, PoolStatus, RuntimeClient,
    ScaleResult,
};

/// Future returned by a [`TaskIpsFn`].
pub type TaskIpsFuture = Pin<Box<dyn Future<Output = ScaleResult<HashSet<String>>> + Send>>;

/// Supplies the current private-IP set of one runtime service's tasks.
pub type TaskIpsFn = Arc<dyn Fn() -> TaskIpsFuture + Send + Sync>;

/// Task-IP supplier backed by a runtime client. Tasks without an IP are
/// dropped.
pub fn runtime_task_ips(runtime: Arc<dyn RuntimeClient>) -> TaskIpsFn {
    Arc::new(move || -> TaskIpsFuture {
        let runtime = runtime.clone();
        Box::pin(async move {
            let tasks = runtime.task_ips().await?;
            Ok(tasks
                .into_iter()
                .filter(|t| !t.private_ip.is_empty())
                .map(|t| t.private_ip)
                .collect())
        })
    })
}

/// A [`JobServiceClient`] filtered to one runtime service.
///
/// Filtered pool status only counts busy and idle agents, so there
/// `total = busy + idle`. Supplier and inner-client failures propagate
/// unchanged.
pub struct ServiceView {
    inner: Arc<dyn JobServiceClient>,
    kind: JobKind,
    task_ips: TaskIpsFn,
}

impl ServiceView {
    pub fn new(inner: Arc<dyn JobServiceClient>, kind: JobKind, task_ips: TaskIpsFn) -> Self {
        Self {
            inner,
            kind,
            task_ips,
        }
    }

    async fn filtered_agents(&self) -> ScaleResult<Vec<AgentInfo>> {
        let agents = self.inner.agent_details().await?;
        let ips = (self.task_ips)().await?;
        Ok(agents
            .into_iter()
            .filter(|agent| ips.contains(&agent.ip))
            .collect())
    }
}

#[async_trait]
impl JobServiceClient for ServiceView {
    async fn pool_status(&self) -> ScaleResult<PoolStatus> {
        let mut status = PoolStatus::default();
        for agent in self.filtered_agents().await? {
            match agent.status {
                AgentStatus::Busy => {
                    status.busy += 1;
                    status.total += 1;
                }
                AgentStatus::Idle => {
                    status.idle += 1;
                    status.total += 1;
                }
                AgentStatus::Other => {}
            }
        }
        Ok(status)
    }

    async fn pending_jobs(&self) -> ScaleResult<u32> {
        let counts = self.inner.pending_by_kind().await?;
        Ok(match self.kind {
            JobKind::Plan => counts.plan,
            JobKind::Apply => counts.apply,
        })
    }

    async fn pending_by_kind(&self) -> ScaleResult<PendingCounts> {
        self.inner.pending_by_kind().await
    }

    async fn agent_details(&self) -> ScaleResult<Vec<AgentInfo>> {
        self.filtered_agents().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use flock_core::ScaleError;

    struct FakeInner {
        agents: Vec<AgentInfo>,
        pending: PendingCounts,
        fail_agents: bool,
        fail_pending: bool,
    }

    impl FakeInner {
        fn with_agents(agents: Vec<AgentInfo>) -> Arc<Self> {
            Arc::new(Self {
                agents,
                pending: PendingCounts::default(),
                fail_agents: false,
                fail_pending: false,
            })
        }

        fn with_pending(plan: u32, apply: u32) -> Arc<Self> {
            Arc::new(Self {
                agents: Vec::new(),
                pending: PendingCounts { plan, apply },
                fail_agents: false,
                fail_pending: false,
            })
        }
    }

    #[async_trait]
    impl JobServiceClient for FakeInner {
        async fn pool_status(&self) -> ScaleResult<PoolStatus> {
            unimplemented!("views never call the raw pool status")
        }

        async fn pending_jobs(&self) -> ScaleResult<u32> {
            unimplemented!("views never call the raw pending count")
        }

        async fn pending_by_kind(&self) -> ScaleResult<PendingCounts> {
            if self.fail_pending {
                return Err(ScaleError::JobServiceRead("queue down".to_string()));
            }
            Ok(self.pending)
        }

        async fn agent_details(&self) -> ScaleResult<Vec<AgentInfo>> {
            if self.fail_agents {
                return Err(ScaleError::JobServiceRead("agent list down".to_string()));
            }
            Ok(self.agents.clone())
        }
    }

    fn agent(id: &str, ip: &str, status: AgentStatus) -> AgentInfo {
        AgentInfo {
            id: id.to_string(),
            name: format!("agent-{id}"),
            ip: ip.to_string(),
            status,
        }
    }

    fn ips(values: &[&str]) -> TaskIpsFn {
        let set: HashSet<String> = values.iter().map(|s| s.to_string()).collect();
        Arc::new(move || -> TaskIpsFuture {
            let set = set.clone();
            Box::pin(async move { Ok(set) })
        })
    }

    fn failing_ips() -> TaskIpsFn {
        Arc::new(|| -> TaskIpsFuture {
            Box::pin(async { Err(ScaleError::RuntimeRead("task lookup down".to_string())) })
        })
    }

    #[tokio::test]
    async fn pending_jobs_selects_the_plan_slice() {
        let view = ServiceView::new(FakeInner::with_pending(5, 3), JobKind::Plan, ips(&[]));
        assert_eq!(view.pending_jobs().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn pending_jobs_selects_the_apply_slice() {
        let view = ServiceView::new(FakeInner::with_pending(5, 3), JobKind::Apply, ips(&[]));
        assert_eq!(view.pending_jobs().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn pool_status_filters_by_task_ip() {
        let inner = FakeInner::with_agents(vec![
            agent("a1", "10.0.0.1", AgentStatus::Busy),
            agent("a2", "10.0.0.2", AgentStatus::Idle),
            agent("a3", "10.0.0.3", AgentStatus::Busy),
            agent("a4", "10.0.0.4", AgentStatus::Idle),
        ]);
        let view = ServiceView::new(inner, JobKind::Plan, ips(&["10.0.0.1", "10.0.0.3"]));

        let status = view.pool_status().await.unwrap();
        assert_eq!(
            status,
            PoolStatus {
                busy: 2,
                idle: 0,
                total: 2,
            }
        );
    }

    #[tokio::test]
    async fn pool_status_drops_unknown_statuses() {
        let inner = FakeInner::with_agents(vec![
            agent("a1", "10.0.0.1", AgentStatus::Idle),
            agent("a2", "10.0.0.2", AgentStatus::Other),
        ]);
        let view = ServiceView::new(inner, JobKind::Plan, ips(&["10.0.0.1", "10.0.0.2"]));

        let status = view.pool_status().await.unwrap();
        assert_eq!(
            status,
            PoolStatus {
                busy: 0,
                idle: 1,
                total: 1,
            }
        );
    }

    #[tokio::test]
    async fn pool_status_with_no_matching_ips_is_empty() {
        let inner = FakeInner::with_agents(vec![agent("a1", "10.0.0.1", AgentStatus::Busy)]);
        let view = ServiceView::new(inner, JobKind::Plan, ips(&["10.0.0.99"]));

        let status = view.pool_status().await.unwrap();
        assert_eq!(status, PoolStatus::default());
    }

    #[tokio::test]
    async fn agent_details_returns_the_filtered_list() {
        let inner = FakeInner::with_agents(vec![
            agent("a1", "10.0.0.1", AgentStatus::Busy),
            agent("a2", "10.0.0.2", AgentStatus::Idle),
            agent("a3", "10.0.0.3", AgentStatus::Busy),
        ]);
        let view = ServiceView::new(inner, JobKind::Plan, ips(&["10.0.0.1", "10.0.0.3"]));

        let agents = view.agent_details().await.unwrap();
        assert_eq!(agents.len(), 2);
        assert_eq!(agents[0].id, "a1");
        assert_eq!(agents[1].id, "a3");
    }

    #[tokio::test]
    async fn supplier_failure_propagates() {
        let inner = FakeInner::with_agents(vec![agent("a1", "10.0.0.1", AgentStatus::Busy)]);
        let view = ServiceView::new(inner, JobKind::Plan, failing_ips());

        let err = view.pool_status().await.unwrap_err();
        assert!(matches!(err, ScaleError::RuntimeRead(_)));
    }

    #[tokio::test]
    async fn inner_client_failure_propagates() {
        let inner = Arc::new(FakeInner {
            agents: Vec::new(),
            pending: PendingCounts::default(),
            fail_agents: true,
            fail_pending: false,
        });
        let view = ServiceView::new(inner, JobKind::Plan, ips(&[]));

        let err = view.agent_details().await.unwrap_err();
        assert!(matches!(err, ScaleError::JobServiceRead(_)));
    }

    #[tokio::test]
    async fn pending_failure_propagates() {
        let inner = Arc::new(FakeInner {
            agents: Vec::new(),
            pending: PendingCounts::default(),
            fail_agents: false,
            fail_pending: true,
        });
        let view = ServiceView::new(inner, JobKind::Apply, ips(&[]));

        let err = view.pending_jobs().await.unwrap_err();
        assert!(matches!(err, ScaleError::JobServiceRead(_)));
    }
}
