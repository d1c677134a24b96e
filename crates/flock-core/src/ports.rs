//! Ports consumed by the reconciliation engine.
//!
//! The engine only ever sees these traits. The raw HTTP clients implement
//! them directly; a filtered per-service view implements `JobServiceClient`
//! on top of another `JobServiceClient`, so the engine cannot tell the two
//! apart.

use async_trait::async_trait;

use crate::error::ScaleResult;
use crate::types::{
    AgentInfo, GaugeSample, PendingCounts, PoolStatus, ScaleDirection, ServiceStatus, TaskInfo,
};

/// Read-side view of the remote job service.
#[async_trait]
pub trait JobServiceClient: Send + Sync {
    /// Busy/idle/total agent counts.
    async fn pool_status(&self) -> ScaleResult<PoolStatus>;

    /// Total number of jobs waiting for an agent.
    async fn pending_jobs(&self) -> ScaleResult<u32>;

    /// Pending jobs split by kind.
    async fn pending_by_kind(&self) -> ScaleResult<PendingCounts>;

    /// Details for every agent. Unordered; pagination is the adapter's job.
    async fn agent_details(&self) -> ScaleResult<Vec<AgentInfo>>;
}

/// Control surface of the container runtime for one worker service.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Desired and running worker counts.
    async fn service_status(&self) -> ScaleResult<ServiceStatus>;

    /// Set the desired worker count. Re-setting the current value is allowed.
    async fn set_desired(&self, count: u32) -> ScaleResult<()>;

    /// Enumerate the service's tasks with their private IPs.
    async fn task_ips(&self) -> ScaleResult<Vec<TaskInfo>>;

    /// Enable or disable termination protection on the given tasks.
    ///
    /// The adapter splits oversized lists into runtime-sized batches.
    /// When `enabled` is false the TTL is ignored.
    async fn set_protection(
        &self,
        handles: &[String],
        enabled: bool,
        ttl_minutes: u32,
    ) -> ScaleResult<()>;
}

/// Recording surface for reconcile telemetry.
///
/// All methods are non-blocking. The engine holds an `Option` of this and
/// must behave identically with no sink configured.
pub trait MetricsSink: Send + Sync {
    /// Latest gauge values observed by a cycle.
    fn record_poll(&self, sample: &GaugeSample);

    /// Outcome of a cycle.
    fn record_result(&self, ok: bool);

    /// A desired-count change was applied.
    fn record_scale_event(&self, direction: ScaleDirection);

    /// A scale-down was blocked by the cooldown window.
    fn record_cooldown_skip(&self);

    /// A protection update failed (the scale-down still proceeded).
    fn record_protection_error(&self);
}
