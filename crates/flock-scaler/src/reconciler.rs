//! One scaling control loop: sample → decide → guard → protect → apply.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use flock_core::{
    GaugeSample, JobServiceClient, MetricsSink, ReadyLatch, ReadySignal, ReconcilerConfig,
    RuntimeClient, ScaleDirection, ScaleResult,
};

use crate::protection;

/// Outcome of the scale-down policy for one cycle.
enum ScaleDownPlan {
    /// Shrink to this count.
    Proceed(u32),
    /// The cooldown window is still open.
    CooldownActive,
    /// The idle guard left nothing removable.
    NothingRemovable,
}

/// The autoscaling engine for one runtime service.
///
/// Owns its cooldown state and ready latch; clients are shared and must
/// tolerate concurrent use. Repeated cycles against an unchanged world
/// converge after the first apply and then stop mutating.
pub struct Reconciler {
    config: ReconcilerConfig,
    jobs: Arc<dyn JobServiceClient>,
    runtime: Arc<dyn RuntimeClient>,
    metrics: Option<Arc<dyn MetricsSink>>,
    /// Set on every successful apply that changed the count.
    last_scale_time: Option<Instant>,
    ready: ReadyLatch,
}

impl Reconciler {
    pub fn new(
        config: ReconcilerConfig,
        jobs: Arc<dyn JobServiceClient>,
        runtime: Arc<dyn RuntimeClient>,
    ) -> ScaleResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            jobs,
            runtime,
            metrics: None,
            last_scale_time: None,
            ready: ReadyLatch::new(),
        })
    }

    /// Attach an optional metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Read handle that latches after the first successful cycle in [`run`].
    ///
    /// [`run`]: Reconciler::run
    pub fn ready(&self) -> ReadySignal {
        self.ready.signal()
    }

    /// Drive the loop until `shutdown` fires.
    ///
    /// Reconciles immediately, then once per poll interval (start to
    /// start). Cycle errors are logged and swallowed; the loop only exits
    /// on shutdown. An in-flight cycle is dropped at its next suspension
    /// point when shutdown fires.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            service = %self.config.name,
            min_agents = self.config.min_agents,
            max_agents = self.config.max_agents,
            poll_interval = ?self.config.poll_interval,
            cooldown = ?self.config.cooldown,
            "starting autoscaler loop"
        );

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = shutdown.changed() => break,
                result = self.reconcile() => match result {
                    Ok(()) => self.ready.set(),
                    Err(e) => error!(service = %self.config.name, error = %e, "reconcile failed"),
                }
            }
        }

        info!(service = %self.config.name, "autoscaler loop stopped");
    }

    /// Perform one check-and-scale cycle.
    ///
    /// Never touches the ready latch; that is [`run`]'s job, so tests can
    /// call this directly without perturbing readiness.
    ///
    /// [`run`]: Reconciler::run
    pub async fn reconcile(&mut self) -> ScaleResult<()> {
        let (pool, pending, service) = tokio::join!(
            self.jobs.pool_status(),
            self.jobs.pending_jobs(),
            self.runtime.service_status(),
        );
        let pool = self.noted(pool)?;
        let pending = self.noted(pending)?;
        let service = self.noted(service)?;

        if let Some(m) = &self.metrics {
            m.record_poll(&GaugeSample {
                busy: pool.busy,
                idle: pool.idle,
                total: pool.total,
                pending,
                desired: service.desired,
                running: service.running,
            });
        }

        let target = compute_target(
            pending,
            pool.busy,
            self.config.min_agents,
            self.config.max_agents,
        );

        debug!(
            service = %self.config.name,
            pending,
            busy = pool.busy,
            idle = pool.idle,
            total = pool.total,
            current_desired = service.desired,
            current_running = service.running,
            target,
            "reconcile"
        );

        if target == service.desired {
            self.record_result(true);
            return Ok(());
        }

        // Scale-up applies immediately; scale-down passes through the
        // cooldown window and the idle guard first.
        let new_desired = if target > service.desired {
            target
        } else {
            match self.plan_scale_down(target, service.desired, pool.idle) {
                ScaleDownPlan::Proceed(count) => {
                    if let Err(e) = protection::update(
                        self.jobs.as_ref(),
                        self.runtime.as_ref(),
                        self.config.protection_ttl_minutes,
                    )
                    .await
                    {
                        warn!(
                            service = %self.config.name,
                            error = %e,
                            "task protection failed, proceeding under idle guard"
                        );
                        if let Some(m) = &self.metrics {
                            m.record_protection_error();
                        }
                    }
                    count
                }
                ScaleDownPlan::CooldownActive => {
                    if let Some(m) = &self.metrics {
                        m.record_cooldown_skip();
                    }
                    self.record_result(true);
                    return Ok(());
                }
                ScaleDownPlan::NothingRemovable => {
                    self.record_result(true);
                    return Ok(());
                }
            }
        };

        let direction = if new_desired > service.desired {
            ScaleDirection::Up
        } else {
            ScaleDirection::Down
        };

        info!(
            service = %self.config.name,
            from = service.desired,
            to = new_desired,
            direction = direction.as_str(),
            "scaling"
        );

        let applied = self.runtime.set_desired(new_desired).await;
        self.noted(applied)?;

        if let Some(m) = &self.metrics {
            m.record_scale_event(direction);
        }
        self.last_scale_time = Some(Instant::now());
        self.record_result(true);
        Ok(())
    }

    /// Apply the cooldown window and the idle guard to a scale-down.
    ///
    /// The guard removes at most as many workers as are currently idle,
    /// so busy workers always survive the shrink.
    fn plan_scale_down(&self, target: u32, current_desired: u32, idle: u32) -> ScaleDownPlan {
        if let Some(last) = self.last_scale_time {
            let elapsed = last.elapsed();
            if elapsed < self.config.cooldown {
                info!(
                    service = %self.config.name,
                    cooldown_remaining = ?(self.config.cooldown - elapsed),
                    "scale-down skipped due to cooldown"
                );
                return ScaleDownPlan::CooldownActive;
            }
        }

        let scale_down_by = (current_desired - target).min(idle);
        let guarded = current_desired - scale_down_by;

        debug!(
            service = %self.config.name,
            target,
            idle,
            scale_down_by,
            guarded_target = guarded,
            "idle guard applied"
        );

        if guarded == current_desired {
            ScaleDownPlan::NothingRemovable
        } else {
            ScaleDownPlan::Proceed(guarded)
        }
    }

    /// Pass a remote-call result through, recording an error outcome.
    fn noted<T>(&self, result: ScaleResult<T>) -> ScaleResult<T> {
        if result.is_err() {
            self.record_result(false);
        }
        result
    }

    fn record_result(&self, ok: bool) {
        if let Some(m) = &self.metrics {
            m.record_result(ok);
        }
    }
}

/// Target worker count: one worker for every pending job plus every busy
/// agent, clamped to the configured bounds.
fn compute_target(pending: u32, busy: u32, min_agents: u32, max_agents: u32) -> u32 {
    pending.saturating_add(busy).clamp(min_agents, max_agents)
}
