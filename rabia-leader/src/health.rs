//! Node health monitoring and status tracking (Node-State Tracker, component C).

use crate::LeaderResult;
use rabia_core::NodeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Health status of a peer. There is no "degraded" tier: a connection either
/// succeeds (Healthy) or it doesn't (Suspected, then Disabled after enough
/// consecutive failures).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Suspected,
    Disabled,
}

/// Per-peer tracker state.
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub node_id: NodeId,
    pub status: HealthStatus,
    pub failed_attempts: u32,
    pub last_attempt: Instant,
    pub next_attempt_after: Option<Instant>,
}

impl NodeHealth {
    fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            status: HealthStatus::Healthy,
            failed_attempts: 0,
            last_attempt: Instant::now(),
            next_attempt_after: None,
        }
    }

    /// Whether a connection attempt to this peer should be made right now.
    pub fn can_attempt(&self, now: Instant) -> bool {
        match self.status {
            HealthStatus::Healthy => true,
            HealthStatus::Suspected => self
                .next_attempt_after
                .map(|deadline| now >= deadline)
                .unwrap_or(true),
            HealthStatus::Disabled => false,
        }
    }

    /// Healthy or Suspected peers are active: still worth counting as part of
    /// the working cluster even while backing off.
    pub fn is_active(&self) -> bool {
        matches!(self.status, HealthStatus::Healthy | HealthStatus::Suspected)
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_failed_attempts: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            max_failed_attempts: 10,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct HealthStats {
    pub total_outcomes: u64,
    pub nodes_marked_suspected: u64,
    pub nodes_marked_disabled: u64,
    pub nodes_recovered: u64,
}

/// Tracks connection outcomes for every peer and derives a health state per
/// §4.C's transition table. Connection attempts themselves are driven by the
/// network layer; this tracker only records outcomes and decides backoff.
pub struct HealthMonitor {
    config: HealthConfig,
    node_health: Arc<RwLock<HashMap<NodeId, NodeHealth>>>,
    stats: Arc<RwLock<HealthStats>>,
}

impl HealthMonitor {
    pub async fn new() -> LeaderResult<Self> {
        Self::with_config(HealthConfig::default()).await
    }

    pub async fn with_config(config: HealthConfig) -> LeaderResult<Self> {
        Ok(Self {
            config,
            node_health: Arc::new(RwLock::new(HashMap::new())),
            stats: Arc::new(RwLock::new(HealthStats::default())),
        })
    }

    pub async fn register_node(&self, node_id: NodeId) -> LeaderResult<()> {
        let mut node_health = self.node_health.write().await;
        node_health
            .entry(node_id)
            .or_insert_with(|| NodeHealth::new(node_id));
        debug!("registered node {} for health tracking", node_id);
        Ok(())
    }

    pub async fn unregister_node(&self, node_id: NodeId) -> LeaderResult<()> {
        let mut node_health = self.node_health.write().await;
        node_health.remove(&node_id);
        debug!("unregistered node {} from health tracking", node_id);
        Ok(())
    }

    /// Records a successful connection/heartbeat: always resets to Healthy.
    pub async fn record_success(&self, node_id: NodeId) -> LeaderResult<HealthStatus> {
        let now = Instant::now();
        let mut node_health = self.node_health.write().await;
        let mut stats = self.stats.write().await;
        let health = node_health
            .entry(node_id)
            .or_insert_with(|| NodeHealth::new(node_id));

        if health.status != HealthStatus::Healthy {
            debug!("node {} recovered, marking healthy", node_id);
            stats.nodes_recovered += 1;
        }

        health.status = HealthStatus::Healthy;
        health.failed_attempts = 0;
        health.last_attempt = now;
        health.next_attempt_after = None;
        stats.total_outcomes += 1;

        Ok(health.status)
    }

    /// Records a failed connection attempt and advances the backoff state per
    /// §4.C's transition table.
    pub async fn record_failure(&self, node_id: NodeId) -> LeaderResult<HealthStatus> {
        let now = Instant::now();
        let mut node_health = self.node_health.write().await;
        let mut stats = self.stats.write().await;
        let health = node_health
            .entry(node_id)
            .or_insert_with(|| NodeHealth::new(node_id));

        health.last_attempt = now;
        health.failed_attempts += 1;
        stats.total_outcomes += 1;

        if health.failed_attempts >= self.config.max_failed_attempts {
            if health.status != HealthStatus::Disabled {
                warn!("node {} exceeded max failed attempts, disabling", node_id);
                stats.nodes_marked_disabled += 1;
            }
            health.status = HealthStatus::Disabled;
            health.next_attempt_after = None;
        } else {
            if health.status == HealthStatus::Healthy {
                stats.nodes_marked_suspected += 1;
            }
            health.status = HealthStatus::Suspected;
            let backoff = self
                .config
                .initial_backoff
                .saturating_mul(1u32 << (health.failed_attempts.saturating_sub(1)).min(31))
                .min(self.config.max_backoff);
            health.next_attempt_after = Some(now + backoff);
        }

        Ok(health.status)
    }

    /// Explicit re-enable, bypassing backoff (e.g. an operator override).
    pub async fn re_enable(&self, node_id: NodeId) -> LeaderResult<()> {
        let mut node_health = self.node_health.write().await;
        if let Some(health) = node_health.get_mut(&node_id) {
            health.status = HealthStatus::Healthy;
            health.failed_attempts = 0;
            health.next_attempt_after = None;
        }
        Ok(())
    }

    pub async fn get_node_health(&self, node_id: NodeId) -> Option<NodeHealth> {
        self.node_health.read().await.get(&node_id).cloned()
    }

    pub async fn get_all_health(&self) -> HashMap<NodeId, NodeHealth> {
        self.node_health.read().await.clone()
    }

    pub async fn get_active_nodes(&self) -> Vec<NodeId> {
        self.node_health
            .read()
            .await
            .values()
            .filter(|h| h.is_active())
            .map(|h| h.node_id)
            .collect()
    }

    pub async fn can_attempt(&self, node_id: NodeId) -> bool {
        let now = Instant::now();
        self.node_health
            .read()
            .await
            .get(&node_id)
            .map(|h| h.can_attempt(now))
            .unwrap_or(true)
    }

    pub async fn get_stats(&self) -> HealthStats {
        self.stats.read().await.clone()
    }
}
