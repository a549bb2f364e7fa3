//! Deterministic leader assignment for coordination tasks (§4.J).
//!
//! Consensus itself is leader-less; this module only answers "which single
//! node should drive a coordination task" (e.g. periodic snapshot
//! compaction). The answer is a pure function of the active peer set: no
//! terms, no elections, no heartbeats.

use crate::{HealthMonitor, LeaderNotificationBus, LeaderResult, TopologyManager};
use rabia_core::{ConsensusState, NodeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Statistics about leadership operations
#[derive(Debug, Default, Clone)]
pub struct LeadershipStats {
    pub leader_changes: u64,
}

/// Assigns and tracks the deterministic leader: `min(active_peers ∪ {self})`.
pub struct LeaderManager {
    node_id: NodeId,
    current_leader: Arc<RwLock<Option<NodeId>>>,
    topology: Arc<TopologyManager>,
    health_monitor: Arc<HealthMonitor>,
    notification_bus: Arc<LeaderNotificationBus>,
    stats: Arc<RwLock<LeadershipStats>>,
    consensus_state: Arc<RwLock<HashMap<NodeId, ConsensusState>>>,
}

impl LeaderManager {
    pub async fn new(node_id: NodeId) -> LeaderResult<Self> {
        let topology = Arc::new(TopologyManager::new().await?);
        let health_monitor = Arc::new(HealthMonitor::new().await?);
        let notification_bus = Arc::new(LeaderNotificationBus::new());

        Ok(Self {
            node_id,
            current_leader: Arc::new(RwLock::new(None)),
            topology,
            health_monitor,
            notification_bus,
            stats: Arc::new(RwLock::new(LeadershipStats::default())),
            consensus_state: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// True if this node is presently the assigned leader.
    pub async fn is_leader(&self) -> bool {
        *self.current_leader.read().await == Some(self.node_id)
    }

    pub async fn get_leader(&self) -> Option<NodeId> {
        *self.current_leader.read().await
    }

    /// Recomputes the leader from the current active peer set (Healthy or
    /// Suspected, per the Node-State tracker) and notifies on change. Called
    /// on every `ConnectionEstablished` / `ConnectionFailed` / health
    /// transition.
    pub async fn recompute(&self) -> LeaderResult<Option<NodeId>> {
        let mut active: Vec<NodeId> = self.health_monitor.get_active_nodes().await;
        active.push(self.node_id);
        let winner = active.into_iter().min();

        let mut current = self.current_leader.write().await;
        if *current != winner {
            info!(previous = ?*current, current = ?winner, "leader assignment changed");
            if let Some(new_leader) = winner {
                self.notification_bus
                    .notify_leader_changed(*current, new_leader)
                    .await;
            }
            *current = winner;

            let mut stats = self.stats.write().await;
            stats.leader_changes += 1;
        }

        Ok(winner)
    }

    pub async fn update_consensus_state(
        &self,
        node_id: NodeId,
        state: ConsensusState,
    ) -> LeaderResult<()> {
        let mut consensus_state = self.consensus_state.write().await;
        consensus_state.insert(node_id, state);
        self.notification_bus
            .notify_consensus_state_changed(node_id, state)
            .await;
        Ok(())
    }

    pub async fn get_consensus_states(&self) -> HashMap<NodeId, ConsensusState> {
        self.consensus_state.read().await.clone()
    }

    pub async fn get_stats(&self) -> LeadershipStats {
        self.stats.read().await.clone()
    }

    pub fn topology(&self) -> &Arc<TopologyManager> {
        &self.topology
    }

    pub fn health_monitor(&self) -> &Arc<HealthMonitor> {
        &self.health_monitor
    }

    pub fn notification_bus(&self) -> &Arc<LeaderNotificationBus> {
        &self.notification_bus
    }
}
