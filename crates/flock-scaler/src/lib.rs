//! flock-scaler — the reconciliation engine.
//!
//! Sizes a runtime worker service to match the pending workload of a
//! job-service agent pool. Scale-ups apply immediately; scale-downs pass
//! through a cooldown window, an idle guard, and a best-effort task
//! protection update before any workers are removed.
//!
//! # Architecture
//!
//! ```text
//! Supervisor
//!   ├── Reconciler (one per managed service)
//!   │   ├── reads: pool status + pending jobs + service status
//!   │   ├── target = clamp(pending + busy, min, max)
//!   │   ├── scale-down: cooldown → idle guard → protection → apply
//!   │   └── ReadyLatch (set after the first successful cycle)
//!   └── ServiceView (dual-service mode)
//!       └── narrows the shared job-service client by task IPs + job kind
//! ```
//!
//! The engine only depends on the port traits in `flock-core`; a raw
//! client and a [`ServiceView`] are interchangeable.

pub mod protection;
pub mod reconciler;
pub mod supervisor;
pub mod view;

pub use reconciler::Reconciler;
pub use supervisor::Supervisor;
pub use view::{runtime_task_ips, ServiceView, TaskIpsFn, TaskIpsFuture};
