//! Timer and stop signal for the control loop
//!
//! The loop never calls `tokio::time::sleep` directly; it goes through a `Scheduler`
//! so tests can swap in a fake clock. A stop request is only observed between ticks
//! or while sleeping, never in the middle of a tick.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Elapsed,
    Stopped,
}

#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Sleep for `duration`, returning early with `Wake::Stopped` on a stop request
    async fn sleep(&self, duration: Duration) -> Wake;

    fn stop_requested(&self) -> bool;
}

/// Handle used by the operator side (Ctrl+C, tests) to stop the loop
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    pub fn stop(&self) {
        // send_replace works even when no receiver is currently waiting
        self.tx.send_replace(true);
    }
}

/// Wall-clock scheduler on the tokio timer
pub struct TokioScheduler {
    rx: watch::Receiver<bool>,
}

impl TokioScheduler {
    pub fn new() -> (Self, StopHandle) {
        let (tx, rx) = watch::channel(false);
        (Self { rx }, StopHandle { tx })
    }
}

#[async_trait]
impl Scheduler for TokioScheduler {
    async fn sleep(&self, duration: Duration) -> Wake {
        let deadline = Instant::now() + duration;
        let mut rx = self.rx.clone();

        let already_stopped = *rx.borrow();
        if already_stopped {
            return Wake::Stopped;
        }

        let stop_seen = tokio::select! {
            _ = tokio::time::sleep_until(deadline) => return Wake::Elapsed,
            changed = rx.wait_for(|stop| *stop) => changed.is_ok(),
        };
        if stop_seen {
            return Wake::Stopped;
        }

        // Every StopHandle is gone, so nobody can stop us any more
        tokio::time::sleep_until(deadline).await;
        Wake::Elapsed
    }

    fn stop_requested(&self) -> bool {
        *self.rx.borrow()
    }
}
