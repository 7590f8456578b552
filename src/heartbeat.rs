//! Periodic background routines.
//!
//! A [`HeartbeatContext`] owns its routines explicitly; nothing registers
//! into global state. `start` spawns one ticking task, `stop` cancels it and
//! waits for the in-flight tick to finish.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::activity::ActivityJournal;
use crate::net::{CancelHandle, cancel_pair};
use crate::starknet::StarknetRpc;
use crate::tx_status::fetch_tx_status;

/// Work run on every heartbeat tick.
#[async_trait]
pub trait Routine: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<(), String>;
}

struct Running {
    stop: CancelHandle,
    task: JoinHandle<()>,
}

pub struct HeartbeatContext {
    interval: Duration,
    routines: Vec<Arc<dyn Routine>>,
    running: Option<Running>,
}

impl HeartbeatContext {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            routines: Vec::new(),
            running: None,
        }
    }

    /// Add a routine. Takes effect on the next `start`.
    pub fn register(&mut self, routine: Arc<dyn Routine>) {
        tracing::debug!(routine = routine.name(), "Registered heartbeat routine");
        self.routines.push(routine);
    }

    pub fn routine_names(&self) -> Vec<String> {
        self.routines.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Run every routine once, in registration order. Failures are logged
    /// and do not stop later routines.
    pub async fn tick_once(&self) -> usize {
        run_all(&self.routines).await
    }

    /// Spawn the ticking task. The first tick fires immediately. Calling
    /// `start` while running is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            return;
        }
        let (stop, mut signal) = cancel_pair();
        let routines = self.routines.clone();
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = signal.cancelled() => break,
                    _ = ticker.tick() => {
                        run_all(&routines).await;
                    }
                }
            }
            tracing::debug!("Heartbeat loop exited");
        });
        tracing::info!(
            interval_secs = period.as_secs(),
            routines = self.routines.len(),
            "Heartbeat started"
        );
        self.running = Some(Running { stop, task });
    }

    /// Stop ticking and wait for the loop to exit.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.stop.cancel();
        if let Err(e) = running.task.await {
            tracing::warn!("Heartbeat task ended abnormally: {}", e);
        }
        tracing::info!("Heartbeat stopped");
    }
}

/// Returns how many routines failed.
async fn run_all(routines: &[Arc<dyn Routine>]) -> usize {
    let mut failures = 0;
    for routine in routines {
        if let Err(e) = routine.run().await {
            failures += 1;
            tracing::warn!(routine = routine.name(), error = %e, "Heartbeat routine failed");
        }
    }
    failures
}

/// Settles pending journal entries by checking their receipts.
pub struct FinalitySweep {
    journal: Arc<ActivityJournal>,
    rpc: Arc<dyn StarknetRpc>,
}

impl FinalitySweep {
    pub fn new(journal: Arc<ActivityJournal>, rpc: Arc<dyn StarknetRpc>) -> Self {
        Self { journal, rpc }
    }
}

#[async_trait]
impl Routine for FinalitySweep {
    fn name(&self) -> &str {
        "finality_sweep"
    }

    async fn run(&self) -> Result<(), String> {
        let pending = self
            .journal
            .pending_transactions()
            .await
            .map_err(|e| e.to_string())?;
        for hash in pending {
            let result = fetch_tx_status(self.rpc.as_ref(), &hash).await;
            if let Some(record) = self
                .journal
                .record_finality(&hash, &result)
                .await
                .map_err(|e| e.to_string())?
            {
                tracing::info!(tx_hash = %hash, status = record.status.as_str(), "Transaction settled");
            }
        }
        Ok(())
    }
}
