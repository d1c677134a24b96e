//! Readiness probes.

use flock_core::ReadySignal;

/// Reports whether the application is ready to serve.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self) -> bool;
}

impl ReadinessProbe for ReadySignal {
    fn is_ready(&self) -> bool {
        ReadySignal::is_ready(self)
    }
}

/// Ready only when every inner probe is ready. Empty is trivially ready.
pub struct CompositeProbe {
    probes: Vec<Box<dyn ReadinessProbe>>,
}

impl CompositeProbe {
    pub fn new(probes: Vec<Box<dyn ReadinessProbe>>) -> Self {
        Self { probes }
    }

    /// Composite over a set of reconciler ready signals.
    pub fn of_signals(signals: Vec<ReadySignal>) -> Self {
        Self {
            probes: signals
                .into_iter()
                .map(|s| Box::new(s) as Box<dyn ReadinessProbe>)
                .collect(),
        }
    }
}

impl ReadinessProbe for CompositeProbe {
    fn is_ready(&self) -> bool {
        self.probes.iter().all(|p| p.is_ready())
    }
}
