//! Periodic pass scheduling

use std::sync::Arc;
use std::time::Duration;

use kameo::actor::ActorRef;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::actor::InventoryActor;
use crate::message::RunPass;
use crate::state::{LoopState, SharedStatus};

/// Idempotent stop signal shared by the loop and its owner
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Raise the signal; later calls have no effect
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal is raised
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives passes on the inventory actor at a fixed interval
pub struct SyncLoop {
    actor: ActorRef<InventoryActor>,
    interval: Duration,
    scan_on_start: bool,
    status: SharedStatus,
    stop: StopSignal,
}

impl SyncLoop {
    pub fn new(
        actor: ActorRef<InventoryActor>,
        interval: Duration,
        scan_on_start: bool,
        status: SharedStatus,
        stop: StopSignal,
    ) -> Self {
        Self {
            actor,
            interval,
            scan_on_start,
            status,
            stop,
        }
    }

    /// Run the loop on its own task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        info!(interval = ?self.interval, scan_on_start = self.scan_on_start, "sync loop started");

        if self.scan_on_start && !self.stop.is_stopped() {
            self.pass().await;
        }

        loop {
            self.transition(LoopState::Waiting);

            tokio::select! {
                () = self.stop.stopped() => break,
                () = tokio::time::sleep(self.interval) => {}
            }

            self.pass().await;
        }

        self.transition(LoopState::Stopping);
        info!("sync loop stopped");
    }

    /// Ask the actor for a pass and wait for it; the stop signal is not
    /// observed until it finishes
    async fn pass(&self) {
        match self.actor.ask(RunPass::Scheduled).await {
            Ok(summary) => debug!(%summary, "scheduled pass done"),
            Err(e) => warn!(error = %e, "scheduled pass failed"),
        }
        self.transition(LoopState::Idle);
    }

    fn transition(&self, to: LoopState) {
        let from = self.status.loop_state();
        if from != to {
            self.status.set_loop_state(to);
            debug!(from = %from, to = %to, "loop state transition");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stop_signal_is_idempotent() {
        let stop = StopSignal::new();
        assert!(!stop.is_stopped());

        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.stopped().await })
        };

        stop.stop();
        stop.stop();
        assert!(stop.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // already raised: resolves immediately
        tokio::time::timeout(Duration::from_millis(100), stop.stopped())
            .await
            .unwrap();
    }
}
