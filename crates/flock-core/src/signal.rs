//! One-shot readiness latch.
//!
//! A reconciler latches its signal after the first successful cycle; the
//! readiness probe and any number of other observers read it. The latch
//! never reverts.

use tokio::sync::watch;

/// Writer side of the latch. Owned by exactly one reconciler.
#[derive(Debug)]
pub struct ReadyLatch {
    tx: watch::Sender<bool>,
}

impl ReadyLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Latch the signal. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    /// Whether the latch has been set.
    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// A new read handle observing this latch.
    pub fn signal(&self) -> ReadySignal {
        ReadySignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ReadyLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Read handle for a [`ReadyLatch`]. Cheap to clone; any number may exist.
#[derive(Debug, Clone)]
pub struct ReadySignal {
    rx: watch::Receiver<bool>,
}

impl ReadySignal {
    /// Non-blocking observation.
    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the latch is set. Returns immediately if already latched.
    ///
    /// Also returns if the owning latch is dropped without ever being set;
    /// `is_ready` disambiguates the two outcomes.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|ready| *ready).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_unlatched() {
        let latch = ReadyLatch::new();
        assert!(!latch.is_set());
        assert!(!latch.signal().is_ready());
    }

    #[test]
    fn set_is_observable_and_idempotent() {
        let latch = ReadyLatch::new();
        let signal = latch.signal();

        latch.set();
        latch.set();

        assert!(latch.is_set());
        assert!(signal.is_ready());
    }

    #[test]
    fn signals_created_after_set_see_latched_state() {
        let latch = ReadyLatch::new();
        latch.set();
        assert!(latch.signal().is_ready());
    }

    #[tokio::test]
    async fn wait_returns_once_latched() {
        let latch = ReadyLatch::new();
        let mut signal = latch.signal();

        let waiter = tokio::spawn(async move {
            signal.wait().await;
            signal.is_ready()
        });

        latch.set();
        let ready = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter timed out")
            .expect("waiter panicked");
        assert!(ready);
    }

    #[tokio::test]
    async fn all_concurrent_waiters_unblock() {
        let latch = ReadyLatch::new();

        let waiters: Vec<_> = (0..10)
            .map(|_| {
                let mut signal = latch.signal();
                tokio::spawn(async move {
                    signal.wait().await;
                })
            })
            .collect();

        latch.set();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(2), waiter)
                .await
                .expect("waiter timed out")
                .expect("waiter panicked");
        }
    }

    #[tokio::test]
    async fn wait_on_already_latched_signal_is_immediate() {
        let latch = ReadyLatch::new();
        latch.set();

        let mut signal = latch.signal();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("wait should resolve immediately");
    }
}
