use dashmap::DashMap;
use parking_lot::RwLock;
use rabia_core::{
    messages::{PendingBatch, PhaseData},
    BatchId, CommandBatch, NodeId, PhaseId, RabiaError, Result,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// In-memory engine state, shared between the engine task and its
/// `NetworkEventHandler` callbacks via `Arc`. Per-field locking (atomics for
/// scalars, `DashMap`/`RwLock` for collections) follows §5's "no shared
/// mutable state between tasks except fine-grained locking" rule.
#[derive(Debug)]
pub struct EngineState {
    pub current_phase: Arc<AtomicU64>,
    pub last_committed_phase: Arc<AtomicU64>,
    pub is_active: Arc<AtomicBool>,
    pub has_quorum: Arc<AtomicBool>,

    pub pending_batches: Arc<DashMap<BatchId, PendingBatch>>,
    pub phases: Arc<DashMap<PhaseId, PhaseData>>,

    pub active_nodes: Arc<RwLock<HashSet<NodeId>>>,
    pub quorum_size: usize,
    pub f_plus_one: usize,

    /// Set while a `SyncRequest` is outstanding; cleared on `StateTransfer` /
    /// `SnapshotOffer` application, or on timeout before retrying another peer.
    pub syncing: Arc<AtomicBool>,
    pub sync_target: Arc<RwLock<Option<NodeId>>>,

    pub state_version: Arc<AtomicU64>,
    pub last_cleanup: Arc<AtomicU64>,
}

impl EngineState {
    pub fn new(quorum_size: usize, f_plus_one: usize) -> Self {
        Self {
            current_phase: Arc::new(AtomicU64::new(0)),
            last_committed_phase: Arc::new(AtomicU64::new(0)),
            is_active: Arc::new(AtomicBool::new(true)),
            has_quorum: Arc::new(AtomicBool::new(true)),

            pending_batches: Arc::new(DashMap::new()),
            phases: Arc::new(DashMap::new()),

            active_nodes: Arc::new(RwLock::new(HashSet::new())),
            quorum_size,
            f_plus_one,

            syncing: Arc::new(AtomicBool::new(false)),
            sync_target: Arc::new(RwLock::new(None)),

            state_version: Arc::new(AtomicU64::new(1)),
            last_cleanup: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn current_phase(&self) -> PhaseId {
        PhaseId::new(self.current_phase.load(Ordering::Acquire))
    }

    pub fn last_committed_phase(&self) -> PhaseId {
        PhaseId::new(self.last_committed_phase.load(Ordering::Acquire))
    }

    /// Moves `current_phase` to `phase`, used both for ordinary phase advance
    /// after a decision and for fast-forwarding after sync.
    pub fn set_current_phase(&self, phase: PhaseId) {
        self.current_phase.store(phase.value(), Ordering::Release);
        self.increment_version();
    }

    pub fn commit_phase(&self, phase_id: PhaseId) -> Result<bool> {
        let phase_value = phase_id.value();
        let current_phase_value = self.current_phase.load(Ordering::Acquire);

        if phase_value > current_phase_value {
            return Err(RabiaError::InvalidStateTransition {
                from: format!("current_phase={}", current_phase_value),
                to: format!("commit_phase={}", phase_value),
            });
        }

        let mut current = self.last_committed_phase.load(Ordering::Acquire);

        while current < phase_value {
            match self.last_committed_phase.compare_exchange_weak(
                current,
                phase_value,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.increment_version();
                    return Ok(true);
                }
                Err(actual) => {
                    current = actual;
                    if current >= phase_value {
                        return Ok(false);
                    }
                }
            }
        }

        Ok(false)
    }

    pub fn is_active(&self) -> bool {
        self.is_active.load(Ordering::Acquire)
    }

    pub fn set_active(&self, active: bool) {
        if self.is_active.swap(active, Ordering::AcqRel) != active {
            self.increment_version();
        }
    }

    pub fn has_quorum(&self) -> bool {
        self.has_quorum.load(Ordering::Acquire)
    }

    pub fn set_quorum(&self, has_quorum: bool) {
        if self.has_quorum.swap(has_quorum, Ordering::AcqRel) != has_quorum {
            self.increment_version();
        }
    }

    pub fn get_active_nodes(&self) -> HashSet<NodeId> {
        self.active_nodes.read().clone()
    }

    pub fn update_active_nodes(&self, nodes: HashSet<NodeId>) {
        let has_quorum = nodes.len() >= self.quorum_size;

        {
            let mut active_nodes = self.active_nodes.write();
            if *active_nodes != nodes {
                *active_nodes = nodes;
                self.increment_version();
            }
        }

        self.set_quorum(has_quorum);
        self.set_active(has_quorum);
    }

    /// Deterministic cycling order for sync retries: active peers sorted by
    /// `NodeId`, excluding `self_id`.
    pub fn active_peers_ordered(&self, self_id: NodeId) -> Vec<NodeId> {
        let mut peers: Vec<NodeId> = self
            .active_nodes
            .read()
            .iter()
            .filter(|&&n| n != self_id)
            .copied()
            .collect();
        peers.sort();
        peers
    }

    pub fn add_pending_batch(&self, batch: CommandBatch, originator: NodeId) -> BatchId {
        let batch_id = batch.id;
        if !self.pending_batches.contains_key(&batch_id) {
            let pending = PendingBatch::new(batch, originator);
            self.pending_batches.insert(batch_id, pending);
            self.increment_version();
        }
        batch_id
    }

    pub fn remove_pending_batch(&self, batch_id: &BatchId) -> Option<PendingBatch> {
        let result = self.pending_batches.remove(batch_id).map(|(_, v)| v);
        if result.is_some() {
            self.increment_version();
        }
        result
    }

    /// The oldest pending batch not yet decided, used for the proposal step.
    pub fn oldest_pending_batch(&self) -> Option<(BatchId, CommandBatch)> {
        self.pending_batches
            .iter()
            .min_by_key(|entry| entry.value().received_timestamp)
            .map(|entry| (*entry.key(), entry.value().batch.clone()))
    }

    pub fn has_pending_batches(&self) -> bool {
        !self.pending_batches.is_empty()
    }

    pub fn get_or_create_phase(&self, phase_id: PhaseId) -> PhaseData {
        self.phases
            .entry(phase_id)
            .or_insert_with(|| {
                self.increment_version();
                PhaseData::new(phase_id)
            })
            .clone()
    }

    pub fn update_phase<F>(&self, phase_id: PhaseId, update_fn: F) -> Result<()>
    where
        F: FnOnce(&mut PhaseData),
    {
        let mut entry = self
            .phases
            .entry(phase_id)
            .or_insert_with(|| PhaseData::new(phase_id));
        update_fn(&mut entry);
        self.increment_version();
        Ok(())
    }

    pub fn get_phase(&self, phase_id: &PhaseId) -> Option<PhaseData> {
        self.phases.get(phase_id).map(|entry| entry.value().clone())
    }

    pub fn cleanup_old_phases(&self, retention_window: u64) -> usize {
        let current_phase = self.current_phase();
        let cutoff_phase = if current_phase.value() > retention_window {
            PhaseId::new(current_phase.value() - retention_window)
        } else {
            PhaseId::new(0)
        };

        let mut removed_count = 0;
        self.phases.retain(|&phase_id, data| {
            let should_keep = phase_id >= cutoff_phase || !data.is_committed;
            if !should_keep {
                removed_count += 1;
            }
            should_keep
        });

        if removed_count > 0 {
            self.increment_version();
            self.last_cleanup.store(
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap()
                    .as_secs(),
                Ordering::Release,
            );
        }

        removed_count
    }

    pub fn cleanup_old_pending_batches(&self, max_age_secs: u64) -> usize {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        let cutoff = now.saturating_sub(max_age_secs * 1000);

        let mut removed_count = 0;
        self.pending_batches.retain(|_, pending| {
            let should_keep = pending.received_timestamp >= cutoff;
            if !should_keep {
                removed_count += 1;
            }
            should_keep
        });

        if removed_count > 0 {
            self.increment_version();
        }

        removed_count
    }

    pub fn get_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Acquire)
    }

    fn increment_version(&self) {
        self.state_version.fetch_add(1, Ordering::AcqRel);
    }

    pub fn begin_sync(&self, target: NodeId) {
        self.syncing.store(true, Ordering::Release);
        *self.sync_target.write() = Some(target);
    }

    pub fn end_sync(&self) {
        self.syncing.store(false, Ordering::Release);
        *self.sync_target.write() = None;
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn sync_target(&self) -> Option<NodeId> {
        *self.sync_target.read()
    }

    pub fn get_statistics(&self) -> EngineStatistics {
        EngineStatistics {
            current_phase: self.current_phase(),
            last_committed_phase: self.last_committed_phase(),
            pending_batches_count: self.pending_batches.len(),
            phases_count: self.phases.len(),
            active_nodes_count: self.active_nodes.read().len(),
            has_quorum: self.has_quorum(),
            is_active: self.is_active(),
            state_version: self.get_state_version(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineStatistics {
    pub current_phase: PhaseId,
    pub last_committed_phase: PhaseId,
    pub pending_batches_count: usize,
    pub phases_count: usize,
    pub active_nodes_count: usize,
    pub has_quorum: bool,
    pub is_active: bool,
    pub state_version: u64,
}

#[derive(Debug)]
pub struct CommandRequest {
    pub batch: CommandBatch,
    pub response_tx: oneshot::Sender<Result<PhaseId>>,
}

#[derive(Debug)]
pub enum EngineCommand {
    ProcessBatch(CommandRequest),
    Shutdown,
    TriggerSync,
    GetStatistics(oneshot::Sender<EngineStatistics>),
}

pub type EngineCommandSender = mpsc::UnboundedSender<EngineCommand>;
pub type EngineCommandReceiver = mpsc::UnboundedReceiver<EngineCommand>;

#[cfg(test)]
mod tests {
    use super::*;
    use rabia_core::Command;

    #[test]
    fn oldest_pending_batch_is_fifo() {
        let state = EngineState::new(2, 2);
        let first = CommandBatch::new(vec![Command::new("a")]);
        let first_id = first.id;
        state.add_pending_batch(first, NodeId::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = CommandBatch::new(vec![Command::new("b")]);
        state.add_pending_batch(second, NodeId::new());

        let (oldest_id, _) = state.oldest_pending_batch().unwrap();
        assert_eq!(oldest_id, first_id);
    }

    #[test]
    fn commit_phase_rejects_phase_ahead_of_current() {
        let state = EngineState::new(2, 2);
        assert!(state.commit_phase(PhaseId::new(5)).is_err());
    }

    #[test]
    fn active_peers_ordered_excludes_self_and_sorts() {
        let state = EngineState::new(2, 2);
        let self_id = NodeId::new();
        let a = NodeId::new();
        let b = NodeId::new();
        state.update_active_nodes([self_id, a, b].into_iter().collect());

        let peers = state.active_peers_ordered(self_id);
        assert_eq!(peers.len(), 2);
        assert!(!peers.contains(&self_id));
        assert!(peers.windows(2).all(|w| w[0] <= w[1]));
    }
}
