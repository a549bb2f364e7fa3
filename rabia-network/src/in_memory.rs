//! In-process network transport for tests and single-process clusters.
//!
//! Every node's `InMemoryNetwork` is a handle onto a shared `InMemoryNetworkSimulator`
//! message bus: `send_to`/`broadcast` push onto the bus, the simulator's `run` loop
//! delivers each message into the addressed node's own queue. No bytes cross a socket,
//! so this transport exercises the engine's message handling without exercising framing
//! or backpressure (that's `TcpNetwork`'s job).

use async_trait::async_trait;
use rabia_core::{
    messages::ProtocolMessage, network::NetworkTransport, NodeId, RabiaError, Result,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

#[derive(Debug)]
pub struct InMemoryNetwork {
    node_id: NodeId,
    message_queue: Arc<Mutex<VecDeque<(NodeId, ProtocolMessage)>>>,
    connected_nodes: Arc<Mutex<HashSet<NodeId>>>,
    #[allow(clippy::type_complexity)]
    network_bus: Arc<Mutex<Option<mpsc::UnboundedSender<(NodeId, NodeId, ProtocolMessage)>>>>,
}

impl InMemoryNetwork {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            message_queue: Arc::new(Mutex::new(VecDeque::new())),
            connected_nodes: Arc::new(Mutex::new(HashSet::new())),
            network_bus: Arc::new(Mutex::new(None)),
        }
    }

    pub async fn connect_to_bus(
        &self,
        bus: mpsc::UnboundedSender<(NodeId, NodeId, ProtocolMessage)>,
    ) {
        *self.network_bus.lock().await = Some(bus);
    }

    pub async fn deliver_message(&self, from: NodeId, message: ProtocolMessage) {
        self.message_queue.lock().await.push_back((from, message));
    }

    pub async fn set_connected_nodes(&self, nodes: HashSet<NodeId>) {
        *self.connected_nodes.lock().await = nodes;
    }
}

#[async_trait]
impl NetworkTransport for InMemoryNetwork {
    async fn send_to(&self, target: NodeId, message: ProtocolMessage) -> Result<()> {
        let bus = self.network_bus.lock().await;
        if let Some(bus) = bus.as_ref() {
            bus.send((self.node_id, target, message))
                .map_err(|_| RabiaError::network("in-memory bus receiver dropped"))?;
        }
        Ok(())
    }

    async fn broadcast(&self, message: ProtocolMessage, exclude: Option<NodeId>) -> Result<()> {
        let connected = self.connected_nodes.lock().await;
        let bus = self.network_bus.lock().await;

        if let Some(bus) = bus.as_ref() {
            for &node_id in connected.iter() {
                if Some(node_id) != exclude && node_id != self.node_id {
                    bus.send((self.node_id, node_id, message.clone()))
                        .map_err(|_| RabiaError::network("in-memory bus receiver dropped"))?;
                }
            }
        }
        Ok(())
    }

    async fn receive(&mut self) -> Result<(NodeId, ProtocolMessage)> {
        let mut queue = self.message_queue.lock().await;
        match queue.pop_front() {
            Some(entry) => Ok(entry),
            None => {
                drop(queue);
                tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
                Err(RabiaError::network("no messages available"))
            }
        }
    }

    async fn get_connected_nodes(&self) -> Result<HashSet<NodeId>> {
        Ok(self.connected_nodes.lock().await.clone())
    }

    async fn is_connected(&self, node_id: NodeId) -> Result<bool> {
        Ok(self.connected_nodes.lock().await.contains(&node_id))
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected_nodes.lock().await.clear();
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Routes messages between every `InMemoryNetwork` connected to it. Each node calls
/// `connect_to_bus` with the sender half returned from `new`, and `run` must be polled
/// (typically `tokio::spawn`ed) for messages to actually move.
pub struct InMemoryNetworkSimulator {
    nodes: HashMap<NodeId, Arc<Mutex<VecDeque<(NodeId, ProtocolMessage)>>>>,
    message_bus: mpsc::UnboundedReceiver<(NodeId, NodeId, ProtocolMessage)>,
}

impl InMemoryNetworkSimulator {
    pub fn new() -> (Self, mpsc::UnboundedSender<(NodeId, NodeId, ProtocolMessage)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                nodes: HashMap::new(),
                message_bus: rx,
            },
            tx,
        )
    }

    /// Registers `network` so messages addressed to it get delivered; also wires it to
    /// `bus` so its own sends reach the simulator.
    pub async fn add_node(
        &mut self,
        network: &InMemoryNetwork,
        bus: mpsc::UnboundedSender<(NodeId, NodeId, ProtocolMessage)>,
    ) {
        network.connect_to_bus(bus).await;
        self.nodes
            .insert(network.node_id, network.message_queue.clone());
    }

    pub async fn run(&mut self) {
        while let Some((from, to, message)) = self.message_bus.recv().await {
            if let Some(queue) = self.nodes.get(&to) {
                queue.lock().await.push_back((from, message));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabia_core::messages::ProtocolMessage;

    #[tokio::test]
    async fn send_to_delivers_through_the_simulator() {
        let (mut sim, tx) = InMemoryNetworkSimulator::new();

        let a = InMemoryNetwork::new(NodeId::new());
        let mut b = InMemoryNetwork::new(NodeId::new());
        sim.add_node(&a, tx.clone()).await;
        sim.add_node(&b, tx.clone()).await;
        tokio::spawn(async move { sim.run().await });

        let heartbeat = rabia_core::messages::HeartBeatMessage {
            current_phase: rabia_core::PhaseId::new(0),
            active: true,
        };
        a.send_to(b.node_id, ProtocolMessage::heartbeat(a.node_id, heartbeat))
            .await
            .unwrap();

        let (from, _message) = loop {
            match b.receive().await {
                Ok(entry) => break entry,
                Err(_) => continue,
            }
        };
        assert_eq!(from, a.node_id);
    }

    #[tokio::test]
    async fn broadcast_excludes_self_and_the_given_node() {
        let (mut sim, tx) = InMemoryNetworkSimulator::new();
        let a = InMemoryNetwork::new(NodeId::new());
        let mut b = InMemoryNetwork::new(NodeId::new());
        let mut c = InMemoryNetwork::new(NodeId::new());
        sim.add_node(&a, tx.clone()).await;
        sim.add_node(&b, tx.clone()).await;
        sim.add_node(&c, tx.clone()).await;
        a.set_connected_nodes([a.node_id, b.node_id, c.node_id].into_iter().collect())
            .await;
        tokio::spawn(async move { sim.run().await });

        let heartbeat = rabia_core::messages::HeartBeatMessage {
            current_phase: rabia_core::PhaseId::new(0),
            active: true,
        };
        a.broadcast(
            ProtocolMessage::heartbeat(a.node_id, heartbeat),
            Some(c.node_id),
        )
        .await
        .unwrap();

        let received = loop {
            match b.receive().await {
                Ok(entry) => break entry,
                Err(_) => continue,
            }
        };
        assert_eq!(received.0, a.node_id);

        tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        assert!(c.receive().await.is_err());
    }
}
