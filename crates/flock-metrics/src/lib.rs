//! flock-metrics — observability for the autoscaler.
//!
//! A registry of per-service metric sets backed by atomics, and a
//! Prometheus text-exposition renderer for the health server's
//! `/metrics` endpoint.
//!
//! ```text
//! MetricsRegistry
//!   ├── for_service("regular") → Arc<ServiceMetrics>  (a MetricsSink)
//!   ├── for_service("spot")    → Arc<ServiceMetrics>
//!   └── snapshot() → Vec<MetricsSnapshot> → render_prometheus()
//! ```

pub mod registry;
pub mod render;

pub use registry::{MetricsRegistry, MetricsSnapshot, ServiceMetrics};
pub use render::render_prometheus;
