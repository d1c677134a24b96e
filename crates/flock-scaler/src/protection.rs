//! Busy-worker termination protection.
//!
//! Correlates job-service agents with runtime tasks by private IP and
//! flips per-task scale-in protection so the runtime never terminates a
//! worker mid-job. Failures here are absorbed by the reconciler; the idle
//! guard still bounds how far a scale-down can reach.

use std::collections::HashMap;

use tracing::{debug, warn};

use flock_core::{AgentInfo, AgentStatus, JobServiceClient, RuntimeClient, ScaleResult, TaskInfo};

/// Task handles partitioned by the status of the agent occupying each task.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ProtectionSets {
    pub busy: Vec<String>,
    pub idle: Vec<String>,
}

/// Protect busy workers and unprotect everything else.
///
/// Both remote calls are attempted when their partition is non-empty; the
/// first failure propagates to the caller.
pub(crate) async fn update(
    jobs: &dyn JobServiceClient,
    runtime: &dyn RuntimeClient,
    ttl_minutes: u32,
) -> ScaleResult<()> {
    let agents = jobs.agent_details().await?;
    let tasks = runtime.task_ips().await?;
    let sets = partition_by_status(&agents, &tasks);

    if !sets.busy.is_empty() {
        runtime.set_protection(&sets.busy, true, ttl_minutes).await?;
    }
    if !sets.idle.is_empty() {
        runtime.set_protection(&sets.idle, false, 0).await?;
    }

    debug!(
        protected = sets.busy.len(),
        unprotected = sets.idle.len(),
        "task protection updated"
    );
    Ok(())
}

/// Match agents to task handles by private IP.
///
/// Agents whose IP resolves to no task are skipped. A duplicate task IP
/// overwrites the earlier entry; the target runtime never produces one,
/// so it is only logged.
pub(crate) fn partition_by_status(agents: &[AgentInfo], tasks: &[TaskInfo]) -> ProtectionSets {
    let mut ip_to_handle: HashMap<&str, &str> = HashMap::with_capacity(tasks.len());
    for task in tasks {
        if task.private_ip.is_empty() {
            continue;
        }
        if let Some(previous) =
            ip_to_handle.insert(task.private_ip.as_str(), task.handle.as_str())
        {
            warn!(
                ip = %task.private_ip,
                previous = %previous,
                replacement = %task.handle,
                "multiple tasks share a private ip"
            );
        }
    }

    let mut sets = ProtectionSets::default();
    for agent in agents {
        let Some(handle) = ip_to_handle.get(agent.ip.as_str()) else {
            continue;
        };
        match agent.status {
            AgentStatus::Busy => sets.busy.push((*handle).to_string()),
            _ => sets.idle.push((*handle).to_string()),
        }
    }
    sets
}
