//! Prometheus text exposition format.
//!
//! Renders metric snapshots into the text format scraped by a Prometheus
//! server or compatible agent.

use std::fmt::Write;

use crate::registry::MetricsSnapshot;

/// Render snapshots into Prometheus text format with a `service` label.
pub fn render_prometheus(snapshots: &[MetricsSnapshot]) -> String {
    let mut out = String::new();

    gauge(&mut out, snapshots, "flock_pending_jobs", "Jobs waiting for an agent.", |s| {
        s.pending_jobs
    });
    gauge(&mut out, snapshots, "flock_busy_agents", "Agents currently running jobs.", |s| {
        s.busy_agents
    });
    gauge(&mut out, snapshots, "flock_idle_agents", "Agents waiting for work.", |s| {
        s.idle_agents
    });
    gauge(&mut out, snapshots, "flock_total_agents", "Agents registered in the pool.", |s| {
        s.total_agents
    });
    gauge(&mut out, snapshots, "flock_desired_workers", "Runtime desired worker count.", |s| {
        s.desired_workers
    });
    gauge(&mut out, snapshots, "flock_running_workers", "Runtime running worker count.", |s| {
        s.running_workers
    });

    out.push_str("# HELP flock_reconcile_total Reconcile cycles by outcome.\n");
    out.push_str("# TYPE flock_reconcile_total counter\n");
    for s in snapshots {
        let _ = writeln!(
            out,
            "flock_reconcile_total{{service=\"{}\",result=\"success\"}} {}",
            s.service, s.reconcile_success
        );
        let _ = writeln!(
            out,
            "flock_reconcile_total{{service=\"{}\",result=\"error\"}} {}",
            s.service, s.reconcile_error
        );
    }

    out.push_str("# HELP flock_scale_events_total Scaling actions taken.\n");
    out.push_str("# TYPE flock_scale_events_total counter\n");
    for s in snapshots {
        let _ = writeln!(
            out,
            "flock_scale_events_total{{service=\"{}\",direction=\"up\"}} {}",
            s.service, s.scale_up
        );
        let _ = writeln!(
            out,
            "flock_scale_events_total{{service=\"{}\",direction=\"down\"}} {}",
            s.service, s.scale_down
        );
    }

    counter(&mut out, snapshots, "flock_cooldown_skips_total", "Scale-downs blocked by cooldown.", |s| {
        s.cooldown_skips
    });
    counter(&mut out, snapshots, "flock_protection_errors_total", "Task protection update failures.", |s| {
        s.protection_errors
    });

    out
}

fn gauge(
    out: &mut String,
    snapshots: &[MetricsSnapshot],
    name: &str,
    help: &str,
    value: impl Fn(&MetricsSnapshot) -> u64,
) {
    series(out, snapshots, name, help, "gauge", value);
}

fn counter(
    out: &mut String,
    snapshots: &[MetricsSnapshot],
    name: &str,
    help: &str,
    value: impl Fn(&MetricsSnapshot) -> u64,
) {
    series(out, snapshots, name, help, "counter", value);
}

fn series(
    out: &mut String,
    snapshots: &[MetricsSnapshot],
    name: &str,
    help: &str,
    kind: &str,
    value: impl Fn(&MetricsSnapshot) -> u64,
) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} {kind}");
    for s in snapshots {
        let _ = writeln!(out, "{}{{service=\"{}\"}} {}", name, s.service, value(s));
    }
}
