// Local Sync Service - decides whether and from whom to pull
//
// A reducer over SyncEvents. Each event replaces the whole SyncState and
// yields the SyncActions (sends, timers, callbacks) the runtime must carry
// out. Not thread-safe: the caller serializes events through one inbox.
//
// Flow:
// - Idle --trigger--> CheckingStatus: ask a random sample of peers for status
// - CheckingStatus --all answers / timeout--> Syncing if anyone is ahead
// - Syncing: one request at a time to the candidate queue until caught up
//
// Timeouts are never cancelled; each handler checks whether the timeout it
// carries still matches the state and ignores it otherwise.

use crate::ledger::{LedgerProof, LedgerUpdate};
use crate::identity::NodeId;
use crate::sync::events::{
    SyncAction, SyncEvent, SyncLedgerUpdateTimeout, SyncRequestTimeout, SyncTimeout,
};
use crate::sync::messages::{StatusRequest, StatusResponse, SyncMessage, SyncRequest, SyncResponse};
use crate::sync::state::{CheckingStatusState, SyncState, SyncingState};
use crate::sync::{PeersView, ResponseVerifier, SyncConfig, SyncCounters, SyncError};
use rand::seq::SliceRandom;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

pub struct LocalSyncService {
    config: SyncConfig,
    peers: Arc<dyn PeersView>,
    verifier: Box<dyn ResponseVerifier>,
    state: SyncState,
    /// Disambiguates in-flight requests from stale timeouts
    next_request_id: u64,
    counters: SyncCounters,
}

impl LocalSyncService {
    /// Create the service in `initial_state` (normally idle at the persisted header)
    pub fn new(
        config: SyncConfig,
        peers: Arc<dyn PeersView>,
        verifier: Box<dyn ResponseVerifier>,
        initial_state: SyncState,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let mut service = Self {
            config,
            peers,
            verifier,
            state: initial_state,
            next_request_id: 0,
            counters: SyncCounters::default(),
        };
        service.update_counters();
        Ok(service)
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Process one event and return the side effects it requires
    pub fn handle(&mut self, event: SyncEvent) -> Vec<SyncAction> {
        let mut actions = Vec::new();
        let from = self.state.name();
        let next = self.transition(self.state.clone(), event, &mut actions);
        if next.name() != from {
            trace!(from, to = next.name(), "LocalSync: state transition");
        }
        self.state = next;
        self.update_counters();
        actions
    }

    fn transition(
        &mut self,
        state: SyncState,
        event: SyncEvent,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        match (state, event) {
            (SyncState::Idle(s), SyncEvent::SyncCheckTrigger) => {
                self.init_sync_check(s.current().clone(), out)
            }

            (SyncState::CheckingStatus(s), SyncEvent::StatusResponse { peer, response }) => {
                self.process_status_response(s, peer, response, out)
            }
            (SyncState::CheckingStatus(s), SyncEvent::SyncCheckReceiveStatusTimeout) => {
                self.process_peer_statuses(s, out)
            }

            (SyncState::Syncing(s), SyncEvent::SyncResponse { peer, response }) => {
                self.process_sync_response(s, peer, response, out)
            }
            (SyncState::Syncing(s), SyncEvent::SyncRequestTimeout(timeout)) => {
                self.process_sync_request_timeout(s, timeout, out)
            }
            (SyncState::Syncing(s), SyncEvent::SyncLedgerUpdateTimeout(timeout)) => {
                self.process_ledger_update_timeout(s, timeout, out)
            }

            (SyncState::Syncing(s), SyncEvent::LedgerUpdate(update)) => {
                if update.tail().is_ahead_of(s.current()) {
                    self.process_sync(s.with_current(update.tail().clone()), out)
                } else {
                    SyncState::Syncing(s)
                }
            }
            (state, SyncEvent::LedgerUpdate(update)) => self.update_current_header(state, update),

            (SyncState::Syncing(s), SyncEvent::LocalSyncRequest(request)) => self
                .update_target_if_needed(
                    s,
                    request.target_nodes().to_vec(),
                    request.target().clone(),
                    out,
                ),
            (SyncState::Syncing(s), SyncEvent::LedgerStatusUpdate { peer, update }) => {
                self.update_target_if_needed(s, vec![peer], update.header().clone(), out)
            }
            (
                state @ (SyncState::Idle(_) | SyncState::CheckingStatus(_)),
                SyncEvent::LocalSyncRequest(request),
            ) => self.start_sync_if_ahead(
                state,
                request.target_nodes().to_vec(),
                request.target().clone(),
                out,
            ),
            (
                state @ (SyncState::Idle(_) | SyncState::CheckingStatus(_)),
                SyncEvent::LedgerStatusUpdate { peer, update },
            ) => self.start_sync_if_ahead(state, vec![peer], update.header().clone(), out),

            // Timers and messages routinely outlive the state they were meant for
            (state, _) => state,
        }
    }

    // ========================================================================
    // STATUS CHECK
    // ========================================================================

    fn init_sync_check(&mut self, current: LedgerProof, out: &mut Vec<SyncAction>) -> SyncState {
        let peers_to_ask = self.choose_peers_for_sync_check();
        if peers_to_ask.is_empty() {
            debug!("LocalSync: No peers to ask for status, staying idle");
            return SyncState::idle(current);
        }

        trace!(
            peers = peers_to_ask.len(),
            "LocalSync: Initializing sync check"
        );
        self.counters.status_checks_started += 1;

        for peer in &peers_to_ask {
            out.push(SyncAction::Send {
                peer: peer.clone(),
                message: SyncMessage::StatusRequest(StatusRequest),
            });
        }
        out.push(SyncAction::Schedule {
            timeout: SyncTimeout::ReceiveStatus,
            delay: self.config.sync_check_receive_status_timeout(),
        });

        let asked: HashSet<NodeId> = peers_to_ask.into_iter().collect();
        SyncState::CheckingStatus(CheckingStatusState::new(current, asked))
    }

    /// Shuffle-then-take over the peer directory
    fn choose_peers_for_sync_check(&self) -> Vec<NodeId> {
        let mut peers = self.peers.peers();
        peers.shuffle(&mut rand::thread_rng());
        peers.truncate(self.config.sync_check_max_peers);
        peers
    }

    fn process_status_response(
        &mut self,
        state: CheckingStatusState,
        peer: NodeId,
        response: StatusResponse,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        trace!(%peer, version = response.header().state_version(), "LocalSync: Status response");

        if !state.has_asked(&peer) || state.has_response_from(&peer) {
            return SyncState::CheckingStatus(state);
        }

        let state = state.with_response(peer, response.header().clone());
        if state.got_all_responses() {
            self.process_peer_statuses(state, out)
        } else {
            SyncState::CheckingStatus(state)
        }
    }

    /// Sync towards the highest reported header if it is ahead of us
    fn process_peer_statuses(
        &mut self,
        state: CheckingStatusState,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        let max_header = state
            .responses()
            .iter()
            .map(|(_, header)| header)
            .max_by(|a, b| a.compare(b))
            .filter(|header| header.is_ahead_of(state.current()))
            .cloned();

        match max_header {
            Some(target) => {
                let candidates: Vec<NodeId> = state
                    .responses()
                    .iter()
                    .filter(|(_, header)| header.compare(&target) == Ordering::Equal)
                    .map(|(peer, _)| peer.clone())
                    .collect();
                self.start_sync(state.current().clone(), candidates, target, out)
            }
            None => {
                debug!(
                    responses = state.responses().len(),
                    "LocalSync: No peer is ahead, back to idle"
                );
                SyncState::idle(state.current().clone())
            }
        }
    }

    // ========================================================================
    // SYNCING
    // ========================================================================

    fn start_sync_if_ahead(
        &mut self,
        state: SyncState,
        candidates: Vec<NodeId>,
        target: LedgerProof,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        if target.is_ahead_of(state.current()) {
            self.start_sync(state.current().clone(), candidates, target, out)
        } else {
            state
        }
    }

    fn start_sync(
        &mut self,
        current: LedgerProof,
        candidates: Vec<NodeId>,
        target: LedgerProof,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        info!(
            current = current.state_version(),
            target = target.state_version(),
            candidates = candidates.len(),
            "LocalSync: Syncing to target header"
        );
        self.process_sync(SyncingState::new(current, candidates, target), out)
    }

    /// The syncing loop decision: finish, wait, send, or start over
    fn process_sync(&mut self, state: SyncingState, out: &mut Vec<SyncAction>) -> SyncState {
        if state.is_fully_synced() {
            info!(
                version = state.current().state_version(),
                "LocalSync: Fully synced"
            );
            return SyncState::idle(state.current().clone());
        }

        if state.is_waiting_for_response() {
            return SyncState::Syncing(state);
        }

        let (state, next_peer) = state.next_candidate(|peer| self.peers.has_peer(peer));
        match next_peer {
            Some(peer) => SyncState::Syncing(self.send_sync_request(state, peer, out)),
            None => {
                debug!("LocalSync: No candidate peers left, starting a fresh sync check");
                self.init_sync_check(state.current().clone(), out)
            }
        }
    }

    fn send_sync_request(
        &mut self,
        state: SyncingState,
        peer: NodeId,
        out: &mut Vec<SyncAction>,
    ) -> SyncingState {
        self.next_request_id += 1;
        let request_id = self.next_request_id;
        self.counters.sync_requests_sent += 1;

        debug!(
            %peer,
            request_id,
            from = state.current().state_version(),
            "LocalSync: Sending sync request"
        );

        out.push(SyncAction::Send {
            peer: peer.clone(),
            message: SyncMessage::SyncRequest(SyncRequest::new(state.current().descriptor())),
        });
        out.push(SyncAction::Schedule {
            timeout: SyncTimeout::Request(SyncRequestTimeout {
                peer: peer.clone(),
                request_id,
            }),
            delay: self.config.sync_request_timeout(),
        });

        state.with_pending_request(peer, request_id)
    }

    fn process_sync_response(
        &mut self,
        state: SyncingState,
        peer: NodeId,
        response: SyncResponse,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        if !state.is_waiting_for_response_from(&peer) {
            warn!(%peer, "LocalSync: Received unexpected sync response");
            return SyncState::Syncing(state);
        }

        if response.batch().is_empty() {
            warn!(%peer, "LocalSync: Received empty sync response");
            self.counters.empty_responses += 1;
            return self.process_sync(state.clear_pending_request().remove_candidate(&peer), out);
        }

        let start = response.batch().start().accumulator_state.state_version();
        if start > state.current().state_version() {
            warn!(
                %peer,
                start,
                current = state.current().state_version(),
                "LocalSync: Sync response starts past our ledger"
            );
            self.counters.invalid_responses += 1;
            let state = state.clear_pending_request().remove_candidate(&peer);
            out.push(SyncAction::InvalidSyncResponse { peer, response });
            return self.process_sync(state, out);
        }

        if !self.verifier.verify(&response) {
            warn!(%peer, "LocalSync: Received invalid sync response");
            self.counters.invalid_responses += 1;
            let state = state.clear_pending_request().remove_candidate(&peer);
            out.push(SyncAction::InvalidSyncResponse { peer, response });
            return self.process_sync(state, out);
        }

        debug!(
            %peer,
            txns = response.batch().txns().len(),
            end = response.batch().end().state_version(),
            "LocalSync: Verified sync response"
        );
        self.counters.verified_responses += 1;

        // `current` only moves on the LedgerUpdate that follows the commit
        out.push(SyncAction::Schedule {
            timeout: SyncTimeout::LedgerUpdate(SyncLedgerUpdateTimeout {
                state_version: state.current().state_version(),
            }),
            delay: self.config.sync_ledger_update_timeout(),
        });
        out.push(SyncAction::VerifiedSyncResponse(response));

        SyncState::Syncing(state.clear_pending_request())
    }

    fn process_sync_request_timeout(
        &mut self,
        state: SyncingState,
        timeout: SyncRequestTimeout,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        let matches_pending = state
            .pending()
            .is_some_and(|p| p.peer == timeout.peer && p.request_id == timeout.request_id);
        if !matches_pending {
            return SyncState::Syncing(state);
        }

        debug!(peer = %timeout.peer, "LocalSync: Sync request timed out");
        self.counters.sync_request_timeouts += 1;
        self.process_sync(
            state.clear_pending_request().remove_candidate(&timeout.peer),
            out,
        )
    }

    fn process_ledger_update_timeout(
        &mut self,
        state: SyncingState,
        timeout: SyncLedgerUpdateTimeout,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        if timeout.state_version != state.current().state_version() {
            return SyncState::Syncing(state);
        }

        debug!(
            version = timeout.state_version,
            "LocalSync: Verified batch not committed in time, continuing"
        );
        self.counters.ledger_update_timeouts += 1;
        self.process_sync(state, out)
    }

    fn update_target_if_needed(
        &mut self,
        state: SyncingState,
        peers: Vec<NodeId>,
        header: LedgerProof,
        out: &mut Vec<SyncAction>,
    ) -> SyncState {
        if !header.is_ahead_of(state.target()) {
            trace!(
                target = state.target().state_version(),
                "LocalSync: Skipping, already targeting a later header"
            );
            return SyncState::Syncing(state);
        }

        self.process_sync(state.with_target(header).with_candidates(peers), out)
    }

    // ========================================================================
    // LEDGER PROGRESS
    // ========================================================================

    fn update_current_header(&mut self, state: SyncState, update: LedgerUpdate) -> SyncState {
        if update.tail().is_ahead_of(state.current()) {
            state.with_current(update.tail().clone())
        } else {
            state
        }
    }

    fn update_counters(&mut self) {
        let (current, target) = match &self.state {
            SyncState::Syncing(s) => (s.current().state_version(), s.target().state_version()),
            other => {
                let version = other.current().state_version();
                (version, version)
            }
        };
        self.counters.current_state_version = current;
        self.counters.target_state_version = target;
    }
}
