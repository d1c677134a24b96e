//! Reconciler configuration.

use std::time::Duration;

use crate::error::{ScaleError, ScaleResult};

/// Settings for one reconciler, validated at construction.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Label used in logs and metric labels.
    pub name: String,
    /// Lower bound on the worker count.
    pub min_agents: u32,
    /// Upper bound on the worker count.
    pub max_agents: u32,
    /// Start-to-start spacing of reconcile cycles.
    pub poll_interval: Duration,
    /// Minimum wall time between two scale-down applies.
    pub cooldown: Duration,
    /// TTL applied when enabling task termination protection.
    pub protection_ttl_minutes: u32,
}

impl ReconcilerConfig {
    /// Config with the given bounds and the standard defaults:
    /// 10s poll interval, 60s cooldown, 120-minute protection TTL.
    pub fn new(name: &str, min_agents: u32, max_agents: u32) -> Self {
        Self {
            name: name.to_string(),
            min_agents,
            max_agents,
            poll_interval: Duration::from_secs(10),
            cooldown: Duration::from_secs(60),
            protection_ttl_minutes: 120,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_protection_ttl(mut self, minutes: u32) -> Self {
        self.protection_ttl_minutes = minutes;
        self
    }

    pub fn validate(&self) -> ScaleResult<()> {
        if self.min_agents > self.max_agents {
            return Err(ScaleError::Config(format!(
                "min agents ({}) cannot be greater than max agents ({})",
                self.min_agents, self.max_agents
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(ScaleError::Config(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.protection_ttl_minutes == 0 {
            return Err(ScaleError::Config(
                "protection TTL must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like "10s", "500ms", "5m", or a plain number
/// of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
