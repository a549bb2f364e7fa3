use std::time::Duration;

/// Engine tuning knobs. Defaults match the external interface table: phase/sync
/// timeouts, retention and future-phase windows, snapshot cadence, and the
/// Node-State backoff parameters all live here so one config object is enough
/// to start an engine.
#[derive(Debug, Clone)]
pub struct RabiaConfig {
    /// How long the engine waits for this node's own round 2 vote on the
    /// current phase before forcing a coin step (`R2=Q`) on its behalf, so a
    /// stalled phase still makes progress.
    pub phase_timeout: Duration,
    /// How long to wait for a `SyncRequest` response before retrying against a
    /// different peer.
    pub sync_timeout: Duration,
    pub max_batch_size: usize,
    pub max_pending_batches: usize,
    pub cleanup_interval: Duration,
    /// Number of past decisions kept for `StateTransfer` before a lagging node
    /// is sent a snapshot instead (`W` in the sync section).
    pub retention_window: u64,
    /// How far beyond `current_phase` a vote or proposal may reference before
    /// it triggers a `SyncRequest` (`W_future`).
    pub future_phase_window: u64,
    /// Decisions between lazy snapshots.
    pub snapshot_interval: u64,
    pub heartbeat_interval: Duration,
    pub randomization_seed: Option<u64>,
    /// Quorum override; `None` means the default `floor(N/2)+1`. Validated
    /// against the cluster size at startup via `ClusterConfig::with_quorum_override`.
    pub quorum_override: Option<usize>,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_failed_attempts: usize,
}

impl Default for RabiaConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Duration::from_secs(10),
            sync_timeout: Duration::from_secs(5),
            max_batch_size: 1000,
            max_pending_batches: 100,
            cleanup_interval: Duration::from_secs(30),
            retention_window: 1024,
            future_phase_window: 8,
            snapshot_interval: 10_000,
            heartbeat_interval: Duration::from_secs(1),
            randomization_seed: None,
            quorum_override: None,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_failed_attempts: 10,
        }
    }
}

impl RabiaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout = timeout;
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    pub fn with_randomization_seed(mut self, seed: u64) -> Self {
        self.randomization_seed = Some(seed);
        self
    }

    pub fn with_retention_window(mut self, window: u64) -> Self {
        self.retention_window = window;
        self
    }

    pub fn with_future_phase_window(mut self, window: u64) -> Self {
        self.future_phase_window = window;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_quorum_override(mut self, quorum: usize) -> Self {
        self.quorum_override = Some(quorum);
        self
    }
}
