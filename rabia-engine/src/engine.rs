use std::collections::{hash_map::DefaultHasher, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, timeout};
use tracing::{debug, error, info, warn};

use rabia_core::{
    messages::{
        HeartBeatMessage, MessageType, NewBatchMessage, ProposeMessage, ProtocolMessage,
        SnapshotOfferMessage, StateTransferMessage, SyncRequestMessage, VoteRound1Message,
        VoteRound2Message,
    },
    network::{ClusterConfig, NetworkEventHandler, NetworkTransport},
    persistence::{PersistedDecision, PersistenceLayer},
    state_machine::StateMachine,
    BatchId, CommandBatch, NodeId, PhaseId, RabiaError, Result, StateValue, Validator,
};

use crate::driver::{DecidedPhase, DriverSender, ReplicationDriver, DRIVER_QUEUE_DEPTH};
use crate::{CommandRequest, EngineCommand, EngineCommandReceiver, EngineState, RabiaConfig};

/// Pending submissions whose resolution is still awaited: a batch id maps to
/// the caller's response channel, fulfilled when that batch id appears as a
/// decision (or dropped on shutdown, which cancels the future).
type Waiters = std::collections::HashMap<BatchId, tokio::sync::oneshot::Sender<Result<PhaseId>>>;

pub struct RabiaEngine<SM, NT, PL>
where
    SM: StateMachine + 'static,
    NT: NetworkTransport + 'static,
    PL: PersistenceLayer + 'static,
{
    node_id: NodeId,
    config: RabiaConfig,
    cluster_config: ClusterConfig,
    network: Arc<tokio::sync::Mutex<NT>>,
    persistence: Arc<PL>,
    engine_state: Arc<EngineState>,
    command_rx: EngineCommandReceiver,
    waiters: Waiters,
    decision_tx: DriverSender,
    sync_deadline: Option<Instant>,
    /// Deadline for this node's own round-2 vote on the phase it currently
    /// has open, per §5's `phase_timeout`: if it elapses before
    /// `round2_sent`, we force a coin step by casting `R2=Q` ourselves rather
    /// than waiting indefinitely on a stalled round 1.
    phase_deadline: Option<(PhaseId, Instant)>,
}

impl<SM, NT, PL> RabiaEngine<SM, NT, PL>
where
    SM: StateMachine + 'static,
    NT: NetworkTransport + 'static,
    PL: PersistenceLayer + 'static,
{
    /// Builds the engine and its paired [`ReplicationDriver`]. The driver is
    /// returned separately so the caller can run it on its own task; the two
    /// halves communicate over a bounded channel per §4.I.
    pub fn new(
        node_id: NodeId,
        config: RabiaConfig,
        cluster_config: ClusterConfig,
        state_machine: SM,
        network: NT,
        persistence: PL,
        command_rx: EngineCommandReceiver,
    ) -> (Self, ReplicationDriver<SM, PL>) {
        let quorum_size = config
            .quorum_override
            .unwrap_or_else(|| cluster_config.quorum_size());
        let f_plus_one = cluster_config.cluster_size() - quorum_size + 1;

        let persistence = Arc::new(persistence);
        let (decision_tx, decision_rx) = tokio::sync::mpsc::channel(DRIVER_QUEUE_DEPTH);
        let driver = ReplicationDriver::new(
            Arc::new(tokio::sync::Mutex::new(state_machine)),
            persistence.clone(),
            config.snapshot_interval,
            decision_rx,
        );

        let engine = Self {
            node_id,
            config: config.clone(),
            cluster_config: cluster_config.clone(),
            network: Arc::new(tokio::sync::Mutex::new(network)),
            persistence,
            engine_state: Arc::new(EngineState::new(quorum_size, f_plus_one)),
            command_rx,
            waiters: Waiters::new(),
            decision_tx,
            sync_deadline: None,
            phase_deadline: None,
        };

        (engine, driver)
    }

    pub async fn run(mut self) -> Result<()> {
        info!(node = %self.node_id, "starting consensus engine");

        let mut cleanup_interval = interval(self.config.cleanup_interval);
        let mut heartbeat_interval = interval(self.config.heartbeat_interval);
        let mut message_buffer = Vec::new();

        self.initialize().await?;

        loop {
            if let Err(e) = self.receive_messages(&mut message_buffer).await {
                error!("error receiving messages: {}", e);
            } else {
                for (from, message) in message_buffer.drain(..) {
                    if let Err(e) = self.handle_message(from, message).await {
                        warn!("error handling message from {}: {}", from, e);
                    }
                }
            }

            if self.sync_timed_out() {
                self.retry_sync_with_next_peer().await?;
            }

            if self.phase_timed_out() {
                self.force_coin_step_on_timeout().await?;
            }

            tokio::select! {
                command_opt = self.command_rx.recv() => {
                    match command_opt {
                        Some(EngineCommand::Shutdown) => {
                            info!("shutting down consensus engine");
                            return Ok(());
                        }
                        Some(command) => {
                            if let Err(e) = self.handle_command(command).await {
                                error!("error handling command: {}", e);
                            }
                        }
                        None => return Ok(()),
                    }
                }
                _ = cleanup_interval.tick() => {
                    self.cleanup_old_state().await;
                }
                _ = heartbeat_interval.tick() => {
                    if let Err(e) = self.send_heartbeat().await {
                        warn!("failed to send heartbeat: {}", e);
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(1)) => {}
            }
        }
    }

    async fn initialize(&mut self) -> Result<()> {
        let metadata = self.persistence.load_metadata().await?;
        if let Some(phase) = metadata.current_phase {
            self.engine_state.set_current_phase(phase);
        }

        if let Some((snapshot_phase, snapshot)) = self.persistence.load_snapshot().await? {
            info!(phase = %snapshot_phase, "restoring from snapshot");
            self.decision_tx
                .send(DecidedPhase {
                    phase: snapshot_phase,
                    batch: None,
                })
                .await
                .map_err(|_| RabiaError::internal("driver channel closed during init"))?;
            let _ = snapshot;
        }

        let connected_nodes = self.network.lock().await.get_connected_nodes().await?;
        self.engine_state.update_active_nodes(connected_nodes);

        info!("engine initialized");
        Ok(())
    }

    async fn handle_command(&mut self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::ProcessBatch(request) => self.process_batch_request(request).await,
            EngineCommand::Shutdown => unreachable!("handled in run()"),
            EngineCommand::TriggerSync => self.initiate_sync().await,
            EngineCommand::GetStatistics(tx) => {
                let stats = self.engine_state.get_statistics();
                let _ = tx.send(stats);
                Ok(())
            }
        }
    }

    async fn process_batch_request(&mut self, request: CommandRequest) -> Result<()> {
        if !self.engine_state.has_quorum() {
            let _ = request.response_tx.send(Err(RabiaError::QuorumNotAvailable {
                current: self.engine_state.get_active_nodes().len(),
                required: self.engine_state.quorum_size,
            }));
            return Ok(());
        }

        let batch_id = request.batch.id;
        self.waiters.insert(batch_id, request.response_tx);
        self.engine_state
            .add_pending_batch(request.batch, self.node_id);

        self.drive_open_phase().await
    }

    /// Opens the current phase if it is not already in progress: proposes the
    /// oldest pending batch (first-proposal-wins at every receiver resolves
    /// any conflict with concurrent proposals) and casts this node's own
    /// round-1 vote.
    async fn drive_open_phase(&mut self) -> Result<()> {
        if !self.engine_state.has_pending_batches() || self.engine_state.is_syncing() {
            return Ok(());
        }

        let phase_id = self.engine_state.current_phase();
        let phase = self.engine_state.get_or_create_phase(phase_id);
        if phase.round1_sent {
            return Ok(()); // phase already open
        }

        if phase.preferred_batch.is_none() {
            if let Some((batch_id, batch)) = self.engine_state.oldest_pending_batch() {
                self.engine_state.update_phase(phase_id, |p| {
                    p.accept_proposal(batch_id, batch.clone())
                })?;

                let proposal = ProposeMessage {
                    phase_id,
                    batch_id,
                    batch,
                };
                let message = ProtocolMessage::propose(self.node_id, proposal);
                self.network
                    .lock()
                    .await
                    .broadcast(message, Some(self.node_id))
                    .await?;
            }
        }

        self.cast_round1_vote(phase_id).await
    }

    async fn cast_round1_vote(&mut self, phase_id: PhaseId) -> Result<()> {
        let phase = self.engine_state.get_or_create_phase(phase_id);
        if phase.round1_sent {
            return Ok(());
        }

        let vote = if phase.preferred_batch.is_some() {
            StateValue::V1
        } else {
            StateValue::V0
        };

        self.engine_state.update_phase(phase_id, |p| {
            p.add_round1_vote(self.node_id, vote.clone());
            p.round1_sent = true;
        })?;
        self.phase_deadline = Some((phase_id, Instant::now() + self.config.phase_timeout));

        let vote_msg = VoteRound1Message {
            phase_id,
            voter_id: self.node_id,
            vote,
        };
        let message = ProtocolMessage::vote_round1(self.node_id, vote_msg);
        self.network
            .lock()
            .await
            .broadcast(message, Some(self.node_id))
            .await?;

        self.try_round1_decision(phase_id).await
    }

    async fn handle_message(&mut self, from: NodeId, message: ProtocolMessage) -> Result<()> {
        if let Err(e) = message.validate() {
            warn!("received invalid message from {}: {}", from, e);
            return Ok(()); // protocol violation: logged, ignored (§7)
        }

        if self.check_future_phase(from, &message.message_type).await? {
            return Ok(());
        }

        match message.message_type {
            MessageType::Propose(propose) => self.handle_propose(from, propose).await,
            MessageType::R1(vote) => self.handle_vote_round1(from, vote).await,
            MessageType::R2(vote) => self.handle_vote_round2(from, vote).await,
            MessageType::SyncRequest(request) => self.handle_sync_request(from, request).await,
            MessageType::StateTransfer(transfer) => {
                self.handle_state_transfer(from, transfer).await
            }
            MessageType::SnapshotOffer(offer) => self.handle_snapshot_offer(from, offer).await,
            MessageType::NewBatch(new_batch) => self.handle_new_batch(from, new_batch).await,
            MessageType::HeartBeat(heartbeat) => self.handle_heartbeat(from, heartbeat).await,
        }
    }

    /// If `message` references a phase further ahead than `future_phase_window`,
    /// issue a `SyncRequest` to its sender and drop the message (it will be
    /// resent implicitly once we catch up, since the sender rebroadcasts on
    /// every vote round).
    async fn check_future_phase(&mut self, from: NodeId, message: &MessageType) -> Result<bool> {
        let referenced = match message {
            MessageType::Propose(m) => Some(m.phase_id),
            MessageType::R1(m) => Some(m.phase_id),
            MessageType::R2(m) => Some(m.phase_id),
            _ => None,
        };

        let Some(phase) = referenced else { return Ok(false) };
        let current = self.engine_state.current_phase();
        if phase.value() > current.value() + self.config.future_phase_window {
            if !self.engine_state.is_syncing() {
                self.start_sync(from).await?;
            }
            return Ok(true);
        }
        Ok(false)
    }

    async fn handle_propose(&mut self, from: NodeId, propose: ProposeMessage) -> Result<()> {
        if !self.engine_state.has_quorum() {
            return Ok(());
        }

        debug!("proposal from {} for phase {}", from, propose.phase_id);
        self.engine_state
            .add_pending_batch(propose.batch.clone(), from);
        self.engine_state.update_phase(propose.phase_id, |phase| {
            phase.accept_proposal(propose.batch_id, propose.batch);
        })?;

        if propose.phase_id == self.engine_state.current_phase() {
            self.cast_round1_vote(propose.phase_id).await?;
        }

        Ok(())
    }

    async fn handle_vote_round1(&mut self, from: NodeId, vote: VoteRound1Message) -> Result<()> {
        self.engine_state.update_phase(vote.phase_id, |phase| {
            phase.add_round1_vote(from, vote.vote);
        })?;

        self.try_round1_decision(vote.phase_id).await
    }

    /// §4.H step 3: on `>= Q` round-1 votes, emit a round-2 vote reflecting
    /// whichever value (if any) reached quorum, else `VQuestion`.
    async fn try_round1_decision(&mut self, phase_id: PhaseId) -> Result<()> {
        let phase = match self.engine_state.get_phase(&phase_id) {
            Some(p) => p,
            None => return Ok(()),
        };

        if phase.round2_sent || phase.round1_vote_count() < self.engine_state.quorum_size {
            return Ok(());
        }

        let round2_vote = phase
            .round1_decision(self.engine_state.quorum_size)
            .unwrap_or(StateValue::VQuestion);

        self.engine_state.update_phase(phase_id, |phase| {
            phase.add_round2_vote(self.node_id, round2_vote.clone());
            phase.round2_sent = true;
        })?;
        self.clear_phase_deadline(phase_id);

        let vote_msg = VoteRound2Message {
            phase_id,
            voter_id: self.node_id,
            vote: round2_vote,
        };
        let message = ProtocolMessage::vote_round2(self.node_id, vote_msg);
        self.network
            .lock()
            .await
            .broadcast(message, Some(self.node_id))
            .await?;

        self.try_round2_decision(phase_id).await
    }

    async fn handle_vote_round2(&mut self, from: NodeId, vote: VoteRound2Message) -> Result<()> {
        self.engine_state.update_phase(vote.phase_id, |phase| {
            phase.add_round2_vote(from, vote.vote);
        })?;

        self.try_round2_decision(vote.phase_id).await
    }

    /// §4.H step 4: decide on `>= f+1` round-2 votes for one value; otherwise
    /// run the coin step.
    async fn try_round2_decision(&mut self, phase_id: PhaseId) -> Result<()> {
        let phase = match self.engine_state.get_phase(&phase_id) {
            Some(p) => p,
            None => return Ok(()),
        };

        // Gate on Q votes received (the spec's trigger threshold); the
        // decision itself still requires f+1 agreeing votes among them.
        if phase.is_committed || phase.round2_vote_count() < self.engine_state.quorum_size {
            return Ok(());
        }

        match phase.round2_decision(self.engine_state.f_plus_one) {
            Some(StateValue::V1) => {
                let batch = phase.preferred_batch.clone().map(|(_, b)| b);
                self.decide(phase_id, StateValue::V1, batch).await
            }
            Some(StateValue::V0) => self.decide(phase_id, StateValue::V0, None).await,
            _ => self.run_coin_step(phase_id).await,
        }
    }

    /// Deterministic pseudo-random bit derived from `hash(phase)`, identical
    /// on every node since every node hashes the same `PhaseId`.
    fn coin_bit(phase_id: PhaseId) -> bool {
        let mut hasher = DefaultHasher::new();
        phase_id.value().hash(&mut hasher);
        hasher.finish() & 1 == 1
    }

    async fn run_coin_step(&mut self, phase_id: PhaseId) -> Result<()> {
        let keep_preferred_batch = Self::coin_bit(phase_id);
        debug!(
            phase = %phase_id,
            keep_preferred_batch,
            "round 2 undecided, running coin step"
        );

        self.engine_state.update_phase(phase_id, |phase| {
            phase.reset_for_retry(keep_preferred_batch);
        })?;

        self.cast_round1_vote(phase_id).await
    }

    fn clear_phase_deadline(&mut self, phase_id: PhaseId) {
        if self.phase_deadline.map(|(p, _)| p) == Some(phase_id) {
            self.phase_deadline = None;
        }
    }

    fn phase_timed_out(&self) -> bool {
        match self.phase_deadline {
            Some((_, deadline)) => Instant::now() >= deadline,
            None => false,
        }
    }

    /// §5: force a coin step by casting our own `R2=Q` once `phase_timeout`
    /// elapses without this node having sent a round-2 vote.
    async fn force_coin_step_on_timeout(&mut self) -> Result<()> {
        let Some((phase_id, _)) = self.phase_deadline else {
            return Ok(());
        };
        self.phase_deadline = None;

        let phase = match self.engine_state.get_phase(&phase_id) {
            Some(p) => p,
            None => return Ok(()),
        };
        if phase.round2_sent || phase.is_committed {
            return Ok(());
        }

        warn!(phase = %phase_id, "phase timed out waiting on round 2, forcing coin step");

        self.engine_state.update_phase(phase_id, |phase| {
            phase.add_round2_vote(self.node_id, StateValue::VQuestion);
            phase.round2_sent = true;
        })?;

        let vote_msg = VoteRound2Message {
            phase_id,
            voter_id: self.node_id,
            vote: StateValue::VQuestion,
        };
        let message = ProtocolMessage::vote_round2(self.node_id, vote_msg);
        self.network
            .lock()
            .await
            .broadcast(message, Some(self.node_id))
            .await?;

        self.try_round2_decision(phase_id).await
    }

    async fn decide(
        &mut self,
        phase_id: PhaseId,
        decision: StateValue,
        batch: Option<CommandBatch>,
    ) -> Result<()> {
        info!(phase = %phase_id, ?decision, "phase decided");

        self.engine_state.update_phase(phase_id, |phase| {
            phase.set_decision(decision.clone());
        })?;

        let persisted = PersistedDecision::new(phase_id, batch.clone());
        // A failed persist halts the engine: applying an unpersisted decision
        // risks divergence after a crash (§7).
        self.persistence.persist_decision(&persisted).await?;
        self.persistence
            .save_metadata(&rabia_core::persistence::PersistenceMetadata {
                current_phase: Some(phase_id),
                last_snapshot_phase: None,
            })
            .await?;

        if let Some(batch) = &batch {
            self.engine_state.remove_pending_batch(&batch.id);
            if let Some(tx) = self.waiters.remove(&batch.id) {
                let _ = tx.send(Ok(phase_id));
            }
        }

        self.decision_tx
            .send(DecidedPhase {
                phase: phase_id,
                batch,
            })
            .await
            .map_err(|_| RabiaError::internal("driver channel closed"))?;

        self.engine_state.commit_phase(phase_id)?;
        self.engine_state.set_current_phase(phase_id.next());

        self.drive_open_phase().await
    }

    async fn handle_new_batch(&mut self, from: NodeId, new_batch: NewBatchMessage) -> Result<()> {
        debug!("new batch from {}", from);
        self.engine_state
            .add_pending_batch(new_batch.batch, new_batch.originator);
        self.drive_open_phase().await
    }

    async fn handle_heartbeat(&mut self, from: NodeId, heartbeat: HeartBeatMessage) -> Result<()> {
        debug!(
            "heartbeat from {} at phase {}",
            from, heartbeat.current_phase
        );
        Ok(())
    }

    async fn send_heartbeat(&mut self) -> Result<()> {
        let heartbeat = HeartBeatMessage {
            current_phase: self.engine_state.current_phase(),
            active: self.engine_state.is_active(),
        };
        let message = ProtocolMessage::heartbeat(self.node_id, heartbeat);
        self.network
            .lock()
            .await
            .broadcast(message, Some(self.node_id))
            .await?;
        Ok(())
    }

    // --- Synchronization of lagging nodes (§4.H "Synchronization") ---

    async fn initiate_sync(&mut self) -> Result<()> {
        let peers = self.engine_state.active_peers_ordered(self.node_id);
        match peers.first() {
            Some(&target) => self.start_sync(target).await,
            None => Err(RabiaError::OutOfSyncNoPeers),
        }
    }

    async fn start_sync(&mut self, target: NodeId) -> Result<()> {
        info!(target = %target, "requesting sync");
        self.engine_state.begin_sync(target);
        self.sync_deadline = Some(Instant::now() + self.config.sync_timeout);

        let request = SyncRequestMessage {
            requester_phase: self.engine_state.current_phase(),
        };
        let message = ProtocolMessage::sync_request(self.node_id, target, request);
        self.network.lock().await.send_to(target, message).await
    }

    fn sync_timed_out(&self) -> bool {
        match (self.engine_state.is_syncing(), self.sync_deadline) {
            (true, Some(deadline)) => Instant::now() >= deadline,
            _ => false,
        }
    }

    async fn retry_sync_with_next_peer(&mut self) -> Result<()> {
        let failed = self.engine_state.sync_target();
        let peers = self.engine_state.active_peers_ordered(self.node_id);
        let next = peers.into_iter().find(|p| Some(*p) != failed);

        match next {
            Some(target) => {
                warn!(%target, "sync timed out, retrying against next peer");
                self.start_sync(target).await
            }
            None => {
                error!("sync exhausted every active peer");
                self.engine_state.end_sync();
                self.sync_deadline = None;
                Err(RabiaError::OutOfSyncNoPeers)
            }
        }
    }

    async fn handle_sync_request(
        &mut self,
        from: NodeId,
        request: SyncRequestMessage,
    ) -> Result<()> {
        debug!("sync request from {} at phase {}", from, request.requester_phase);

        let current_phase = self.engine_state.current_phase();
        let gap = current_phase.value().saturating_sub(request.requester_phase.value());

        if gap <= self.config.retention_window {
            let decisions = self
                .persistence
                .load_decisions()
                .await?
                .into_iter()
                .filter(|d| d.phase.value() > request.requester_phase.value())
                .map(|d| (d.phase, d.batch))
                .collect();

            let response = StateTransferMessage {
                decisions,
                responder_phase: current_phase,
            };
            let message = ProtocolMessage::state_transfer(self.node_id, from, response);
            self.network.lock().await.send_to(from, message).await
        } else {
            let snapshot_entry = self.persistence.load_snapshot().await?;
            let (snapshot_phase, snapshot) = match snapshot_entry {
                Some(entry) => entry,
                None => return Ok(()), // nothing to offer yet
            };

            let offer = SnapshotOfferMessage {
                snapshot,
                snapshot_phase,
            };
            let message = ProtocolMessage::snapshot_offer(self.node_id, from, offer);
            self.network.lock().await.send_to(from, message).await
        }
    }

    async fn handle_state_transfer(
        &mut self,
        from: NodeId,
        transfer: StateTransferMessage,
    ) -> Result<()> {
        if self.engine_state.sync_target() != Some(from) {
            return Ok(());
        }
        info!(responder_phase = %transfer.responder_phase, "applying state transfer");

        for (phase, batch) in transfer.decisions {
            self.decision_tx
                .send(DecidedPhase { phase, batch })
                .await
                .map_err(|_| RabiaError::internal("driver channel closed during sync"))?;
        }

        self.engine_state.set_current_phase(transfer.responder_phase.next());
        self.engine_state.end_sync();
        self.sync_deadline = None;
        self.drive_open_phase().await
    }

    async fn handle_snapshot_offer(
        &mut self,
        from: NodeId,
        offer: SnapshotOfferMessage,
    ) -> Result<()> {
        if self.engine_state.sync_target() != Some(from) {
            return Ok(());
        }
        info!(phase = %offer.snapshot_phase, "applying snapshot offer");

        self.persistence
            .persist_snapshot(offer.snapshot_phase, &offer.snapshot)
            .await?;
        self.decision_tx
            .send(DecidedPhase {
                phase: offer.snapshot_phase,
                batch: None,
            })
            .await
            .map_err(|_| RabiaError::internal("driver channel closed during sync"))?;

        self.engine_state.set_current_phase(offer.snapshot_phase.next());
        self.engine_state.end_sync();
        self.sync_deadline = None;
        self.drive_open_phase().await
    }

    async fn cleanup_old_state(&mut self) {
        let removed_phases = self
            .engine_state
            .cleanup_old_phases(self.config.retention_window);
        let removed_batches = self.engine_state.cleanup_old_pending_batches(300);

        if removed_phases > 0 || removed_batches > 0 {
            debug!(
                "cleaned up {} old phases and {} old batches",
                removed_phases, removed_batches
            );
        }
    }

    async fn receive_messages(&self, buffer: &mut Vec<(NodeId, ProtocolMessage)>) -> Result<()> {
        let mut network = self.network.lock().await;

        match timeout(Duration::from_millis(10), network.receive()).await {
            Ok(Ok((from, message))) => {
                buffer.push((from, message));
                for _ in 0..10 {
                    match timeout(Duration::from_millis(1), network.receive()).await {
                        Ok(Ok((from, message))) => buffer.push((from, message)),
                        _ => break,
                    }
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {}
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl<SM, NT, PL> NetworkEventHandler for RabiaEngine<SM, NT, PL>
where
    SM: StateMachine + 'static,
    NT: NetworkTransport + 'static,
    PL: PersistenceLayer + 'static,
{
    async fn on_node_connected(&self, node_id: NodeId) {
        info!("node {} connected", node_id);
    }

    async fn on_node_disconnected(&self, node_id: NodeId) {
        warn!("node {} disconnected", node_id);
    }

    async fn on_network_partition(&self, active_nodes: HashSet<NodeId>) {
        warn!("network partition, {} active nodes", active_nodes.len());
        self.engine_state.update_active_nodes(active_nodes);
    }

    async fn on_quorum_lost(&self) {
        error!("quorum lost, pausing consensus");
        self.engine_state.set_active(false);
    }

    async fn on_quorum_restored(&self, active_nodes: HashSet<NodeId>) {
        info!("quorum restored with {} nodes", active_nodes.len());
        self.engine_state.update_active_nodes(active_nodes);
        self.engine_state.set_active(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_bit_is_a_pure_function_of_phase() {
        let phase = PhaseId::new(42);
        assert_eq!(
            RabiaEngine::<
                rabia_core::state_machine::InMemoryStateMachine,
                crate::tests_support::NoopTransport,
                rabia_persistence::InMemoryPersistence,
            >::coin_bit(phase),
            RabiaEngine::<
                rabia_core::state_machine::InMemoryStateMachine,
                crate::tests_support::NoopTransport,
                rabia_persistence::InMemoryPersistence,
            >::coin_bit(phase)
        );
    }

    fn test_engine() -> RabiaEngine<
        rabia_core::state_machine::InMemoryStateMachine,
        crate::tests_support::NoopTransport,
        rabia_persistence::InMemoryPersistence,
    > {
        let node_id = NodeId::new();
        let peers = [NodeId::new(), NodeId::new()];
        let all_nodes = [node_id, peers[0], peers[1]].into_iter().collect();
        let cluster_config = ClusterConfig::new(node_id, all_nodes);
        let (_command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
        let config = RabiaConfig::new().with_phase_timeout(Duration::from_millis(20));

        let (engine, _driver) = RabiaEngine::new(
            node_id,
            config,
            cluster_config,
            rabia_core::state_machine::InMemoryStateMachine::new(),
            crate::tests_support::NoopTransport,
            rabia_persistence::InMemoryPersistence::new(),
            command_rx,
        );
        engine
    }

    #[tokio::test]
    async fn phase_timeout_forces_a_coin_step_vote() {
        let mut engine = test_engine();
        let phase_id = engine.engine_state.current_phase();

        engine.cast_round1_vote(phase_id).await.unwrap();
        assert!(!engine
            .engine_state
            .get_phase(&phase_id)
            .unwrap()
            .round2_sent);

        tokio::time::sleep(Duration::from_millis(25)).await;
        assert!(engine.phase_timed_out());

        engine.force_coin_step_on_timeout().await.unwrap();

        let phase = engine.engine_state.get_phase(&phase_id).unwrap();
        assert!(phase.round2_sent);
        assert!(!engine.phase_timed_out());
    }

    #[tokio::test]
    async fn phase_timeout_is_a_noop_once_round2_already_sent() {
        let mut engine = test_engine();
        let phase_id = engine.engine_state.current_phase();

        engine.cast_round1_vote(phase_id).await.unwrap();
        engine.clear_phase_deadline(phase_id);
        engine.phase_deadline = Some((phase_id, Instant::now() - Duration::from_millis(1)));

        engine.engine_state.update_phase(phase_id, |phase| {
            phase.round2_sent = true;
        }).unwrap();

        assert!(engine.phase_timed_out());
        engine.force_coin_step_on_timeout().await.unwrap();
        assert!(engine.phase_deadline.is_none());
    }
}
