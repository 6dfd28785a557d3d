// Sync State - the three mutually exclusive modes of the local sync engine
//
// Every value here is immutable from the outside: transitions build a new
// state from the old one instead of patching fields in place.

use crate::identity::NodeId;
use crate::ledger::LedgerProof;
use std::collections::{HashSet, VecDeque};

/// The request currently in flight while syncing
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRequest {
    pub peer: NodeId,
    pub request_id: u64,
}

/// Waiting for the next periodic sync check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdleState {
    current: LedgerProof,
}

impl IdleState {
    pub fn new(current: LedgerProof) -> Self {
        Self { current }
    }

    pub fn current(&self) -> &LedgerProof {
        &self.current
    }
}

/// Asked a sample of peers for their status, collecting answers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckingStatusState {
    current: LedgerProof,
    asked: HashSet<NodeId>,
    /// In arrival order; at most one entry per peer
    responses: Vec<(NodeId, LedgerProof)>,
}

impl CheckingStatusState {
    pub fn new(current: LedgerProof, asked: HashSet<NodeId>) -> Self {
        Self {
            current,
            asked,
            responses: Vec::new(),
        }
    }

    pub fn current(&self) -> &LedgerProof {
        &self.current
    }

    pub fn asked(&self) -> &HashSet<NodeId> {
        &self.asked
    }

    pub fn responses(&self) -> &[(NodeId, LedgerProof)] {
        &self.responses
    }

    pub fn has_asked(&self, peer: &NodeId) -> bool {
        self.asked.contains(peer)
    }

    pub fn has_response_from(&self, peer: &NodeId) -> bool {
        self.responses.iter().any(|(p, _)| p == peer)
    }

    pub fn got_all_responses(&self) -> bool {
        self.asked.iter().all(|p| self.has_response_from(p))
    }

    pub fn with_response(mut self, peer: NodeId, header: LedgerProof) -> Self {
        if !self.has_response_from(&peer) {
            self.responses.push((peer, header));
        }
        self
    }

    pub fn with_current(mut self, current: LedgerProof) -> Self {
        self.current = current;
        self
    }
}

/// Pulling batches from candidate peers until `current` reaches `target`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncingState {
    current: LedgerProof,
    target: LedgerProof,
    candidates: VecDeque<NodeId>,
    pending: Option<PendingRequest>,
}

impl SyncingState {
    pub fn new(current: LedgerProof, candidates: Vec<NodeId>, target: LedgerProof) -> Self {
        let state = Self {
            current,
            target,
            candidates: VecDeque::new(),
            pending: None,
        };
        state.with_candidates(candidates)
    }

    pub fn current(&self) -> &LedgerProof {
        &self.current
    }

    pub fn target(&self) -> &LedgerProof {
        &self.target
    }

    pub fn candidates(&self) -> &VecDeque<NodeId> {
        &self.candidates
    }

    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    pub fn is_waiting_for_response(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_waiting_for_response_from(&self, peer: &NodeId) -> bool {
        self.pending.as_ref().is_some_and(|p| &p.peer == peer)
    }

    /// `current` has caught up with `target`
    pub fn is_fully_synced(&self) -> bool {
        !self.target.is_ahead_of(&self.current)
    }

    pub fn with_pending_request(mut self, peer: NodeId, request_id: u64) -> Self {
        self.pending = Some(PendingRequest { peer, request_id });
        self
    }

    pub fn clear_pending_request(mut self) -> Self {
        self.pending = None;
        self
    }

    pub fn remove_candidate(mut self, peer: &NodeId) -> Self {
        self.candidates.retain(|p| p != peer);
        self
    }

    /// Append peers not already queued, keeping their order
    pub fn with_candidates(mut self, peers: impl IntoIterator<Item = NodeId>) -> Self {
        for peer in peers {
            if !self.candidates.contains(&peer) {
                self.candidates.push_back(peer);
            }
        }
        self
    }

    pub fn with_target(mut self, target: LedgerProof) -> Self {
        self.target = target;
        self
    }

    pub fn with_current(mut self, current: LedgerProof) -> Self {
        self.current = current;
        self
    }

    /// Take the next usable candidate and rotate it to the back of the queue.
    ///
    /// Candidates rejected by `is_usable` are dropped from the queue.
    pub fn next_candidate(mut self, is_usable: impl Fn(&NodeId) -> bool) -> (Self, Option<NodeId>) {
        while let Some(peer) = self.candidates.pop_front() {
            if is_usable(&peer) {
                self.candidates.push_back(peer.clone());
                return (self, Some(peer));
            }
        }
        (self, None)
    }
}

/// The local sync engine's mode
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle(IdleState),
    CheckingStatus(CheckingStatusState),
    Syncing(SyncingState),
}

impl SyncState {
    /// Fresh idle state seeded from the persisted ledger header
    pub fn idle(current: LedgerProof) -> Self {
        SyncState::Idle(IdleState::new(current))
    }

    pub fn current(&self) -> &LedgerProof {
        match self {
            SyncState::Idle(s) => s.current(),
            SyncState::CheckingStatus(s) => s.current(),
            SyncState::Syncing(s) => s.current(),
        }
    }

    /// Replace the current header whatever the mode
    pub fn with_current(self, current: LedgerProof) -> Self {
        match self {
            SyncState::Idle(_) => SyncState::Idle(IdleState::new(current)),
            SyncState::CheckingStatus(s) => SyncState::CheckingStatus(s.with_current(current)),
            SyncState::Syncing(s) => SyncState::Syncing(s.with_current(current)),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, SyncState::Idle(_))
    }

    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncState::Syncing(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SyncState::Idle(_) => "idle",
            SyncState::CheckingStatus(_) => "checking_status",
            SyncState::Syncing(_) => "syncing",
        }
    }
}
