use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::state_machine::Snapshot;
use crate::{CommandBatch, PhaseId, Result};

/// A committed decision as written to the append-only decision log.
///
/// `batch` is `None` for a null decision (phase decided "skip this slot").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedDecision {
    pub phase: PhaseId,
    pub batch: Option<CommandBatch>,
    pub checksum: u32,
}

impl PersistedDecision {
    pub fn new(phase: PhaseId, batch: Option<CommandBatch>) -> Self {
        let mut entry = Self {
            phase,
            batch,
            checksum: 0,
        };
        entry.checksum = entry.calculate_checksum();
        entry
    }

    pub fn calculate_checksum(&self) -> u32 {
        let mut temp = self.clone();
        temp.checksum = 0;
        let serialized = serde_json::to_vec(&temp).unwrap_or_default();
        crc32fast::hash(&serialized)
    }

    pub fn verify_checksum(&self) -> bool {
        self.calculate_checksum() == self.checksum
    }
}

/// Small metadata record tracked alongside the decision log: the engine's position and
/// the phase up to which the latest snapshot already accounts for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct PersistenceMetadata {
    pub current_phase: Option<PhaseId>,
    pub last_snapshot_phase: Option<PhaseId>,
}

/// Minimum persistence interface needed for crash recovery (§4.H, §6): an append-only
/// decision log, latest-wins snapshots, and a small metadata record.
///
/// `load_decisions` returns a `Vec` rather than a true stream: every implementation here
/// is bounded by the retention window, so materializing the whole log is cheap and
/// keeps the trait object-safe.
#[async_trait]
pub trait PersistenceLayer: Send + Sync {
    /// Appends a decision. Must be durable before the engine applies it to the state
    /// machine (§7: a failed persist-decision halts the engine).
    async fn persist_decision(&self, decision: &PersistedDecision) -> Result<()>;

    /// Loads every retained decision, in phase order.
    async fn load_decisions(&self) -> Result<Vec<PersistedDecision>>;

    /// Drops retained decisions at or before `up_to_phase` (inclusive), called by the
    /// Driver after a successful snapshot.
    async fn prune_decisions_before(&self, up_to_phase: PhaseId) -> Result<()>;

    /// Persists a snapshot, replacing any prior one (latest-wins).
    async fn persist_snapshot(&self, up_to_phase: PhaseId, snapshot: &Snapshot) -> Result<()>;

    /// Loads the latest snapshot, if any.
    async fn load_snapshot(&self) -> Result<Option<(PhaseId, Snapshot)>>;

    async fn load_metadata(&self) -> Result<PersistenceMetadata>;

    async fn save_metadata(&self, metadata: &PersistenceMetadata) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub fsync_on_write: bool,
    pub compression_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            fsync_on_write: true,
            compression_enabled: false,
        }
    }
}
