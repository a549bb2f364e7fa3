use async_trait::async_trait;
use rabia_core::{
    persistence::{PersistedDecision, PersistenceLayer, PersistenceMetadata},
    state_machine::Snapshot,
    PhaseId, RabiaError, Result,
};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// File-based persistence: three files under `data_dir`, matching §6's abstract layout.
///
/// - `decisions.log`: newline-delimited JSON, one `PersistedDecision` per line, appended
///   to on every `persist_decision` and rewritten (pruned) on `prune_decisions_before`.
/// - `snapshot.dat`: the latest snapshot, replaced atomically (write-temp, rename).
/// - `metadata.json`: `current_phase` / `last_snapshot_phase`.
#[derive(Debug, Clone)]
pub struct FileSystemPersistence {
    decisions_path: PathBuf,
    snapshot_path: PathBuf,
    metadata_path: PathBuf,
}

impl FileSystemPersistence {
    pub async fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.exists() {
            fs::create_dir_all(data_dir).await.map_err(|e| {
                RabiaError::persistence(format!("failed to create data directory: {}", e))
            })?;
        }
        Ok(Self {
            decisions_path: data_dir.join("decisions.log"),
            snapshot_path: data_dir.join("snapshot.dat"),
            metadata_path: data_dir.join("metadata.json"),
        })
    }

    pub fn new_sync<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| RabiaError::internal(format!("failed to create runtime: {}", e)))?;
        runtime.block_on(Self::new(data_dir))
    }

    async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to create temp file: {}", e)))?;
        file.write_all(bytes)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to write temp file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to fsync temp file: {}", e)))?;
        fs::rename(&temp_path, path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to rename into place: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceLayer for FileSystemPersistence {
    async fn persist_decision(&self, decision: &PersistedDecision) -> Result<()> {
        if !decision.verify_checksum() {
            return Err(RabiaError::ChecksumMismatch {
                expected: decision.checksum,
                actual: decision.calculate_checksum(),
            });
        }
        let mut line = serde_json::to_vec(decision)?;
        line.push(b'\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.decisions_path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to open decision log: {}", e)))?;
        file.write_all(&line)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to append decision: {}", e)))?;
        Ok(())
    }

    async fn load_decisions(&self) -> Result<Vec<PersistedDecision>> {
        if !self.decisions_path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.decisions_path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to read decision log: {}", e)))?;
        let mut decisions = Vec::new();
        for line in contents.lines().filter(|l| !l.is_empty()) {
            decisions.push(serde_json::from_str(line)?);
        }
        decisions.sort_by_key(|d: &PersistedDecision| d.phase.value());
        Ok(decisions)
    }

    async fn prune_decisions_before(&self, up_to_phase: PhaseId) -> Result<()> {
        let remaining: Vec<PersistedDecision> = self
            .load_decisions()
            .await?
            .into_iter()
            .filter(|d| d.phase.value() > up_to_phase.value())
            .collect();
        let mut bytes = Vec::new();
        for decision in &remaining {
            bytes.extend_from_slice(&serde_json::to_vec(decision)?);
            bytes.push(b'\n');
        }
        Self::write_atomic(&self.decisions_path, &bytes).await
    }

    async fn persist_snapshot(&self, up_to_phase: PhaseId, snapshot: &Snapshot) -> Result<()> {
        if !snapshot.verify_checksum() {
            return Err(RabiaError::ChecksumMismatch {
                expected: snapshot.checksum,
                actual: crc32fast::hash(&snapshot.data),
            });
        }
        let record = (up_to_phase, snapshot.clone());
        let bytes = serde_json::to_vec(&record)?;
        Self::write_atomic(&self.snapshot_path, &bytes).await
    }

    async fn load_snapshot(&self) -> Result<Option<(PhaseId, Snapshot)>> {
        if !self.snapshot_path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&self.snapshot_path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to read snapshot file: {}", e)))?;
        let record: (PhaseId, Snapshot) = serde_json::from_slice(&bytes)?;
        Ok(Some(record))
    }

    async fn load_metadata(&self) -> Result<PersistenceMetadata> {
        if !self.metadata_path.exists() {
            return Ok(PersistenceMetadata::default());
        }
        let bytes = fs::read(&self.metadata_path)
            .await
            .map_err(|e| RabiaError::persistence(format!("failed to read metadata file: {}", e)))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_metadata(&self, metadata: &PersistenceMetadata) -> Result<()> {
        let bytes = serde_json::to_vec(metadata)?;
        Self::write_atomic(&self.metadata_path, &bytes).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabia_core::CommandBatch;
    use tempfile::tempdir;

    #[tokio::test]
    async fn round_trips_decisions_across_instances() {
        let dir = tempdir().unwrap();
        let persistence = FileSystemPersistence::new(dir.path()).await.unwrap();
        let decision = PersistedDecision::new(PhaseId::new(1), Some(CommandBatch::new(vec![])));
        persistence.persist_decision(&decision).await.unwrap();

        let reopened = FileSystemPersistence::new(dir.path()).await.unwrap();
        let loaded = reopened.load_decisions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].phase.value(), 1);
    }

    #[tokio::test]
    async fn snapshot_and_metadata_round_trip() {
        let dir = tempdir().unwrap();
        let persistence = FileSystemPersistence::new(dir.path()).await.unwrap();
        let snapshot = Snapshot::new(7, "state-bytes");
        persistence
            .persist_snapshot(PhaseId::new(700), &snapshot)
            .await
            .unwrap();

        let metadata = PersistenceMetadata {
            current_phase: Some(PhaseId::new(701)),
            last_snapshot_phase: Some(PhaseId::new(700)),
        };
        persistence.save_metadata(&metadata).await.unwrap();

        let (phase, loaded_snapshot) = persistence.load_snapshot().await.unwrap().unwrap();
        assert_eq!(phase.value(), 700);
        assert_eq!(loaded_snapshot.version, 7);

        let loaded_metadata = persistence.load_metadata().await.unwrap();
        assert_eq!(loaded_metadata.current_phase.unwrap().value(), 701);
    }
}
