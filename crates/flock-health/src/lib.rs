//! flock-health — liveness, readiness, and metrics endpoints.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness, always 200 |
//! | GET | `/readyz` | 200 once the composite probe is ready, 503 before |
//! | GET | `/metrics` | Prometheus exposition (when a registry is attached) |

pub mod probe;
pub mod server;

pub use probe::{CompositeProbe, ReadinessProbe};
pub use server::HealthServer;
