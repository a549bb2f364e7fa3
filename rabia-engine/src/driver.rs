//! Replication Driver (§4.I): owns the state machine and applies decisions in
//! phase order, independent of the engine's voting loop. The engine and
//! driver talk over a bounded channel; a full channel back-pressures the
//! engine rather than dropping decisions.

use rabia_core::{
    persistence::PersistenceLayer, state_machine::StateMachine, CommandBatch, PhaseId, Result,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

/// A decided phase handed from the engine to the driver. `batch` is `None` for
/// a null decision: the driver still advances `applied_phase` but applies
/// nothing.
#[derive(Debug, Clone)]
pub struct DecidedPhase {
    pub phase: PhaseId,
    pub batch: Option<CommandBatch>,
}

pub type DriverSender = mpsc::Sender<DecidedPhase>;
pub type DriverReceiver = mpsc::Receiver<DecidedPhase>;

/// Default channel depth between engine and driver.
pub const DRIVER_QUEUE_DEPTH: usize = 256;

pub struct ReplicationDriver<SM, PL>
where
    SM: StateMachine + 'static,
    PL: PersistenceLayer + 'static,
{
    state_machine: Arc<Mutex<SM>>,
    persistence: Arc<PL>,
    applied_phase: Arc<AtomicU64>,
    last_snapshot_phase: Arc<AtomicU64>,
    snapshot_interval: u64,
    decisions: DriverReceiver,
}

impl<SM, PL> ReplicationDriver<SM, PL>
where
    SM: StateMachine + 'static,
    PL: PersistenceLayer + 'static,
{
    pub fn new(
        state_machine: Arc<Mutex<SM>>,
        persistence: Arc<PL>,
        snapshot_interval: u64,
        decisions: DriverReceiver,
    ) -> Self {
        Self {
            state_machine,
            persistence,
            applied_phase: Arc::new(AtomicU64::new(0)),
            last_snapshot_phase: Arc::new(AtomicU64::new(0)),
            snapshot_interval,
            decisions,
        }
    }

    pub fn applied_phase(&self) -> PhaseId {
        PhaseId::new(self.applied_phase.load(Ordering::Acquire))
    }

    /// Drives the apply loop until the engine drops its sender half.
    pub async fn run(mut self) -> Result<()> {
        while let Some(decided) = self.decisions.recv().await {
            self.apply(decided).await?;
        }
        Ok(())
    }

    async fn apply(&mut self, decided: DecidedPhase) -> Result<()> {
        if let Some(batch) = &decided.batch {
            let mut sm = self.state_machine.lock().await;
            sm.apply_commands(&batch.commands).await?;
        }

        self.applied_phase
            .store(decided.phase.value(), Ordering::Release);

        let applied = decided.phase.value();
        let last_snapshot = self.last_snapshot_phase.load(Ordering::Acquire);
        if applied.saturating_sub(last_snapshot) >= self.snapshot_interval {
            self.take_snapshot(decided.phase).await?;
        }

        Ok(())
    }

    /// Pauses application (the caller's loop is already synchronous here, so
    /// this just runs the snapshot inline), snapshots the state machine, and
    /// instructs persistence to prune decisions the snapshot now covers.
    async fn take_snapshot(&mut self, up_to_phase: PhaseId) -> Result<()> {
        debug!(phase = %up_to_phase, "taking lazy snapshot");
        let snapshot = {
            let sm = self.state_machine.lock().await;
            sm.create_snapshot().await?
        };

        self.persistence
            .persist_snapshot(up_to_phase, &snapshot)
            .await?;
        self.persistence.prune_decisions_before(up_to_phase).await?;
        self.last_snapshot_phase
            .store(up_to_phase.value(), Ordering::Release);

        info!(phase = %up_to_phase, "snapshot complete, decisions pruned");
        Ok(())
    }
}
