use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::{NodeId, PhaseId, BatchId, CommandBatch, StateValue};
use crate::state_machine::Snapshot;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMessage {
    pub id: uuid::Uuid,
    pub from: NodeId,
    pub to: Option<NodeId>, // None for broadcast
    pub timestamp: u64,
    pub message_type: MessageType,
}

impl ProtocolMessage {
    pub fn new(from: NodeId, to: Option<NodeId>, message_type: MessageType) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            from,
            to,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
            message_type,
        }
    }

    pub fn propose(from: NodeId, proposal: ProposeMessage) -> Self {
        Self::new(from, None, MessageType::Propose(proposal))
    }

    pub fn vote_round1(from: NodeId, vote: VoteRound1Message) -> Self {
        Self::new(from, None, MessageType::R1(vote))
    }

    pub fn vote_round2(from: NodeId, vote: VoteRound2Message) -> Self {
        Self::new(from, None, MessageType::R2(vote))
    }

    pub fn sync_request(from: NodeId, to: NodeId, request: SyncRequestMessage) -> Self {
        Self::new(from, Some(to), MessageType::SyncRequest(request))
    }

    pub fn state_transfer(from: NodeId, to: NodeId, transfer: StateTransferMessage) -> Self {
        Self::new(from, Some(to), MessageType::StateTransfer(transfer))
    }

    pub fn snapshot_offer(from: NodeId, to: NodeId, offer: SnapshotOfferMessage) -> Self {
        Self::new(from, Some(to), MessageType::SnapshotOffer(offer))
    }

    pub fn new_batch(from: NodeId, batch: NewBatchMessage) -> Self {
        Self::new(from, None, MessageType::NewBatch(batch))
    }

    pub fn heartbeat(from: NodeId, heartbeat: HeartBeatMessage) -> Self {
        Self::new(from, None, MessageType::HeartBeat(heartbeat))
    }
}

/// Wire message variants. `Propose`/`R1`/`R2` are the per-phase sub-state
/// machine (round-trip with `(sender, phase)` headers); `SyncRequest` plus its
/// two possible responses implement lagging-node catch-up; `Heartbeat` and
/// `NewBatch` are the non-consensus management traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MessageType {
    Propose(ProposeMessage),
    R1(VoteRound1Message),
    R2(VoteRound2Message),
    SyncRequest(SyncRequestMessage),
    StateTransfer(StateTransferMessage),
    SnapshotOffer(SnapshotOfferMessage),
    NewBatch(NewBatchMessage),
    HeartBeat(HeartBeatMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposeMessage {
    pub phase_id: PhaseId,
    pub batch_id: BatchId,
    pub batch: CommandBatch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRound1Message {
    pub phase_id: PhaseId,
    pub voter_id: NodeId,
    pub vote: StateValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRound2Message {
    pub phase_id: PhaseId,
    pub voter_id: NodeId,
    pub vote: StateValue,
}

/// Request to catch up past `requester_phase`. The responder chooses between
/// `StateTransfer` and `SnapshotOffer` based on its retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequestMessage {
    pub requester_phase: PhaseId,
}

/// A contiguous run of decisions covering `(requester_phase, responder_phase]`.
/// Sent when the gap fits inside the responder's retention window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransferMessage {
    pub decisions: Vec<(PhaseId, Option<CommandBatch>)>,
    pub responder_phase: PhaseId,
}

/// Sent instead of a `StateTransfer` when the requester has fallen further
/// behind than the responder's retention window covers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOfferMessage {
    pub snapshot: Snapshot,
    pub snapshot_phase: PhaseId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBatchMessage {
    pub batch: CommandBatch,
    pub originator: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartBeatMessage {
    pub current_phase: PhaseId,
    pub active: bool,
}

/// Per-phase tallies. Round-1 and round-2 thresholds are independent: a
/// round-1 majority only requires `Q`, while a round-2 decision requires
/// `f_plus_one`, matching §4.H's R1-decision/R2-decision split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseData {
    pub phase_id: PhaseId,
    pub preferred_batch: Option<(BatchId, CommandBatch)>,
    pub round1_votes: HashMap<NodeId, StateValue>,
    pub round2_votes: HashMap<NodeId, StateValue>,
    pub decision: Option<StateValue>,
    pub timestamp: u64,
    pub is_committed: bool,
    /// Guards against re-broadcasting this node's own round-1/round-2 vote when
    /// a retry (coin step) re-enters the same phase.
    pub round1_sent: bool,
    pub round2_sent: bool,
}

impl PhaseData {
    pub fn new(phase_id: PhaseId) -> Self {
        Self {
            phase_id,
            preferred_batch: None,
            round1_votes: HashMap::new(),
            round2_votes: HashMap::new(),
            decision: None,
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
            is_committed: false,
            round1_sent: false,
            round2_sent: false,
        }
    }

    /// Clears vote tallies and the sent-flags for a coin-step retry while
    /// optionally keeping `preferred_batch` (tentative V1 continuation) or
    /// dropping it (no-preference continuation), per §4.H step 4.
    pub fn reset_for_retry(&mut self, keep_preferred_batch: bool) {
        self.round1_votes.clear();
        self.round2_votes.clear();
        self.round1_sent = false;
        self.round2_sent = false;
        if !keep_preferred_batch {
            self.preferred_batch = None;
        }
    }

    /// First-proposal-wins: only the first accepted proposal for this phase
    /// sets `preferred_batch`; later proposals with a different batch id are
    /// ignored.
    pub fn accept_proposal(&mut self, batch_id: BatchId, batch: CommandBatch) {
        if self.preferred_batch.is_none() {
            self.preferred_batch = Some((batch_id, batch));
        }
    }

    pub fn add_round1_vote(&mut self, voter: NodeId, vote: StateValue) {
        self.round1_votes.insert(voter, vote);
    }

    pub fn add_round2_vote(&mut self, voter: NodeId, vote: StateValue) {
        self.round2_votes.insert(voter, vote);
    }

    /// Round-1 decision rule (§4.H step 3): `>= quorum` votes for a value
    /// decides that value; absent either majority the node emits `VQuestion`
    /// (undecided) and the caller is expected to treat `None` that way.
    pub fn round1_decision(&self, quorum: usize) -> Option<StateValue> {
        decide_majority(&self.round1_votes, quorum)
    }

    /// Round-2 decision rule (§4.H step 4): `>= f_plus_one` votes for V1 or V0
    /// decides or decides-null respectively; otherwise the coin step runs.
    pub fn round2_decision(&self, f_plus_one: usize) -> Option<StateValue> {
        decide_majority(&self.round2_votes, f_plus_one)
    }

    pub fn round1_vote_count(&self) -> usize {
        self.round1_votes.len()
    }

    pub fn round2_vote_count(&self) -> usize {
        self.round2_votes.len()
    }

    pub fn set_decision(&mut self, decision: StateValue) {
        self.decision = Some(decision.clone());
        if decision != StateValue::VQuestion {
            self.is_committed = true;
        }
    }
}

fn decide_majority(
    votes: &HashMap<NodeId, StateValue>,
    threshold: usize,
) -> Option<StateValue> {
    let mut v0_count = 0;
    let mut v1_count = 0;

    for vote in votes.values() {
        match vote {
            StateValue::V0 => v0_count += 1,
            StateValue::V1 => v1_count += 1,
            StateValue::VQuestion => {}
        }
    }

    if v1_count >= threshold {
        Some(StateValue::V1)
    } else if v0_count >= threshold {
        Some(StateValue::V0)
    } else {
        None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingBatch {
    pub batch: CommandBatch,
    pub originator: NodeId,
    pub received_timestamp: u64,
    pub retry_count: usize,
}

impl PendingBatch {
    pub fn new(batch: CommandBatch, originator: NodeId) -> Self {
        Self {
            batch,
            originator,
            received_timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
            retry_count: 0,
        }
    }

    pub fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    pub fn age_millis(&self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as u64;
        now.saturating_sub(self.received_timestamp)
    }
}
