//! flock-core — domain types and ports for the flock autoscaler.
//!
//! Everything the scaling engine needs to talk about without knowing how
//! the remote sides are reached: agents, tasks, pending work, pool status,
//! the client traits the engine consumes, the error taxonomy, reconciler
//! configuration, and the one-shot readiness latch.

pub mod config;
pub mod error;
pub mod ports;
pub mod signal;
pub mod types;

pub use config::{parse_duration, ReconcilerConfig};
pub use error::{ScaleError, ScaleResult};
pub use ports::{JobServiceClient, MetricsSink, RuntimeClient};
pub use signal::{ReadyLatch, ReadySignal};
pub use types::{
    AgentInfo, AgentStatus, GaugeSample, JobKind, PendingCounts, PoolStatus, ScaleDirection,
    ServiceStatus, TaskInfo,
};
