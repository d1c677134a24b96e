//! Per-service metric recording.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use flock_core::{GaugeSample, MetricsSink, ScaleDirection};

/// Metric set for one managed service.
///
/// Gauges hold the latest observed values; counters are monotonic.
/// Recording is lock-free and safe to share across reconcilers.
#[derive(Debug)]
pub struct ServiceMetrics {
    name: String,
    pending_jobs: AtomicU64,
    busy_agents: AtomicU64,
    idle_agents: AtomicU64,
    total_agents: AtomicU64,
    desired_workers: AtomicU64,
    running_workers: AtomicU64,
    reconcile_success: AtomicU64,
    reconcile_error: AtomicU64,
    scale_up: AtomicU64,
    scale_down: AtomicU64,
    cooldown_skips: AtomicU64,
    protection_errors: AtomicU64,
}

impl ServiceMetrics {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pending_jobs: AtomicU64::new(0),
            busy_agents: AtomicU64::new(0),
            idle_agents: AtomicU64::new(0),
            total_agents: AtomicU64::new(0),
            desired_workers: AtomicU64::new(0),
            running_workers: AtomicU64::new(0),
            reconcile_success: AtomicU64::new(0),
            reconcile_error: AtomicU64::new(0),
            scale_up: AtomicU64::new(0),
            scale_down: AtomicU64::new(0),
            cooldown_skips: AtomicU64::new(0),
            protection_errors: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Point-in-time copy of every value in this set.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            service: self.name.clone(),
            pending_jobs: self.pending_jobs.load(Ordering::Relaxed),
            busy_agents: self.busy_agents.load(Ordering::Relaxed),
            idle_agents: self.idle_agents.load(Ordering::Relaxed),
            total_agents: self.total_agents.load(Ordering::Relaxed),
            desired_workers: self.desired_workers.load(Ordering::Relaxed),
            running_workers: self.running_workers.load(Ordering::Relaxed),
            reconcile_success: self.reconcile_success.load(Ordering::Relaxed),
            reconcile_error: self.reconcile_error.load(Ordering::Relaxed),
            scale_up: self.scale_up.load(Ordering::Relaxed),
            scale_down: self.scale_down.load(Ordering::Relaxed),
            cooldown_skips: self.cooldown_skips.load(Ordering::Relaxed),
            protection_errors: self.protection_errors.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for ServiceMetrics {
    fn record_poll(&self, sample: &GaugeSample) {
        self.pending_jobs
            .store(sample.pending as u64, Ordering::Relaxed);
        self.busy_agents.store(sample.busy as u64, Ordering::Relaxed);
        self.idle_agents.store(sample.idle as u64, Ordering::Relaxed);
        self.total_agents
            .store(sample.total as u64, Ordering::Relaxed);
        self.desired_workers
            .store(sample.desired as u64, Ordering::Relaxed);
        self.running_workers
            .store(sample.running as u64, Ordering::Relaxed);
    }

    fn record_result(&self, ok: bool) {
        if ok {
            self.reconcile_success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reconcile_error.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_scale_event(&self, direction: ScaleDirection) {
        match direction {
            ScaleDirection::Up => self.scale_up.fetch_add(1, Ordering::Relaxed),
            ScaleDirection::Down => self.scale_down.fetch_add(1, Ordering::Relaxed),
        };
    }

    fn record_cooldown_skip(&self) {
        self.cooldown_skips.fetch_add(1, Ordering::Relaxed);
    }

    fn record_protection_error(&self) {
        self.protection_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time values of one service's metric set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub service: String,
    pub pending_jobs: u64,
    pub busy_agents: u64,
    pub idle_agents: u64,
    pub total_agents: u64,
    pub desired_workers: u64,
    pub running_workers: u64,
    pub reconcile_success: u64,
    pub reconcile_error: u64,
    pub scale_up: u64,
    pub scale_down: u64,
    pub cooldown_skips: u64,
    pub protection_errors: u64,
}

/// Registry of per-service metric sets.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    services: Mutex<HashMap<String, Arc<ServiceMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The metric set for `name`, created on first use.
    pub fn for_service(&self, name: &str) -> Arc<ServiceMetrics> {
        let mut services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        services
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ServiceMetrics::new(name)))
            .clone()
    }

    /// Snapshots of every registered service, sorted by service name for
    /// stable exposition output.
    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        let services = self.services.lock().unwrap_or_else(|e| e.into_inner());
        let mut snapshots: Vec<MetricsSnapshot> =
            services.values().map(|m| m.snapshot()).collect();
        snapshots.sort_by(|a, b| a.service.cmp(&b.service));
        snapshots
    }

    /// Render every registered service in Prometheus text format.
    pub fn render(&self) -> String {
        crate::render::render_prometheus(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GaugeSample {
        GaugeSample {
            busy: 2,
            idle: 1,
            total: 3,
            pending: 4,
            desired: 5,
            running: 5,
        }
    }

    #[test]
    fn for_service_returns_the_same_set() {
        let registry = MetricsRegistry::new();
        let a = registry.for_service("regular");
        let b = registry.for_service("regular");

        a.record_cooldown_skip();
        assert_eq!(b.snapshot().cooldown_skips, 1);
    }

    #[test]
    fn poll_overwrites_gauges() {
        let registry = MetricsRegistry::new();
        let metrics = registry.for_service("default");

        metrics.record_poll(&sample());
        metrics.record_poll(&GaugeSample {
            busy: 0,
            idle: 0,
            total: 0,
            pending: 9,
            desired: 1,
            running: 0,
        });

        let snap = metrics.snapshot();
        assert_eq!(snap.pending_jobs, 9);
        assert_eq!(snap.busy_agents, 0);
        assert_eq!(snap.desired_workers, 1);
    }

    #[test]
    fn counters_accumulate() {
        let registry = MetricsRegistry::new();
        let metrics = registry.for_service("default");

        metrics.record_result(true);
        metrics.record_result(true);
        metrics.record_result(false);
        metrics.record_scale_event(ScaleDirection::Up);
        metrics.record_scale_event(ScaleDirection::Down);
        metrics.record_scale_event(ScaleDirection::Down);
        metrics.record_cooldown_skip();
        metrics.record_protection_error();

        let snap = metrics.snapshot();
        assert_eq!(snap.reconcile_success, 2);
        assert_eq!(snap.reconcile_error, 1);
        assert_eq!(snap.scale_up, 1);
        assert_eq!(snap.scale_down, 2);
        assert_eq!(snap.cooldown_skips, 1);
        assert_eq!(snap.protection_errors, 1);
    }

    #[test]
    fn snapshot_is_sorted_by_service() {
        let registry = MetricsRegistry::new();
        registry.for_service("spot");
        registry.for_service("regular");

        let snapshots = registry.snapshot();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].service, "regular");
        assert_eq!(snapshots[1].service, "spot");
    }
}
