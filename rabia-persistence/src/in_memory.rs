use async_trait::async_trait;
use parking_lot::RwLock;
use rabia_core::{
    persistence::{PersistedDecision, PersistenceLayer, PersistenceMetadata},
    state_machine::Snapshot,
    PhaseId, RabiaError, Result,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory decision log, snapshot slot and metadata record. Non-persistent across
/// process restarts; intended for tests and single-process clusters.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPersistence {
    decisions: Arc<RwLock<BTreeMap<u64, PersistedDecision>>>,
    snapshot: Arc<RwLock<Option<(PhaseId, Snapshot)>>>,
    metadata: Arc<RwLock<PersistenceMetadata>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceLayer for InMemoryPersistence {
    async fn persist_decision(&self, decision: &PersistedDecision) -> Result<()> {
        if !decision.verify_checksum() {
            return Err(RabiaError::ChecksumMismatch {
                expected: decision.checksum,
                actual: decision.calculate_checksum(),
            });
        }
        self.decisions
            .write()
            .insert(decision.phase.value(), decision.clone());
        Ok(())
    }

    async fn load_decisions(&self) -> Result<Vec<PersistedDecision>> {
        Ok(self.decisions.read().values().cloned().collect())
    }

    async fn prune_decisions_before(&self, up_to_phase: PhaseId) -> Result<()> {
        self.decisions
            .write()
            .retain(|&phase, _| phase > up_to_phase.value());
        Ok(())
    }

    async fn persist_snapshot(&self, up_to_phase: PhaseId, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.verify_checksum() {
            return Err(RabiaError::ChecksumMismatch {
                expected: snapshot.checksum,
                actual: crc32fast::hash(&snapshot.data),
            });
        }
        *self.snapshot.write() = Some((up_to_phase, snapshot.clone()));
        Ok(())
    }

    async fn load_snapshot(&self) -> Result<Option<(PhaseId, Snapshot)>> {
        Ok(self.snapshot.read().clone())
    }

    async fn load_metadata(&self) -> Result<PersistenceMetadata> {
        Ok(*self.metadata.read())
    }

    async fn save_metadata(&self, metadata: &PersistenceMetadata) -> Result<()> {
        *self.metadata.write() = *metadata;
        Ok(())
    }
}
