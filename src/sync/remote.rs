// Remote Sync Service - answers peers and advertises local progress
//
// Serves StatusRequests from the cached ledger header and SyncRequests from
// committed storage. When the local ledger advances it gossips the new
// header to a random sample of peers, but only while the local engine is
// idle, and never faster than the configured token rate.

use crate::identity::NodeId;
use crate::ledger::{LedgerProof, LedgerUpdate};
use crate::storage::CommittedReader;
use crate::sync::events::SyncAction;
use crate::sync::messages::{LedgerStatusUpdate, StatusResponse, SyncMessage, SyncRequest, SyncResponse};
use crate::sync::rate_limit::RateLimiter;
use crate::sync::state::SyncState;
use crate::sync::{PeersView, SyncConfig, SyncCounters, SyncError};
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub struct RemoteSyncService {
    config: SyncConfig,
    peers: Arc<dyn PeersView>,
    reader: Arc<dyn CommittedReader>,
    current_header: LedgerProof,
    limiter: RateLimiter,
    counters: SyncCounters,
}

impl RemoteSyncService {
    pub fn new(
        config: SyncConfig,
        peers: Arc<dyn PeersView>,
        reader: Arc<dyn CommittedReader>,
        current_header: LedgerProof,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let limiter = RateLimiter::new(config.max_ledger_updates_rate);

        Ok(Self {
            config,
            peers,
            reader,
            current_header,
            limiter,
            counters: SyncCounters::default(),
        })
    }

    /// Latest header this node advertises
    pub fn current_header(&self) -> &LedgerProof {
        &self.current_header
    }

    pub fn counters(&self) -> &SyncCounters {
        &self.counters
    }

    pub fn handle_status_request(&mut self, peer: NodeId) -> Vec<SyncAction> {
        trace!(%peer, "RemoteSync: Status request");
        self.counters.remote_status_requests_served += 1;

        vec![SyncAction::Send {
            peer,
            message: SyncMessage::StatusResponse(StatusResponse::new(self.current_header.clone())),
        }]
    }

    /// Serve the batch following the request's cursor; unservable requests are dropped
    pub fn handle_sync_request(&mut self, peer: NodeId, request: &SyncRequest) -> Vec<SyncAction> {
        let cursor = request.cursor();
        let from = cursor.accumulator_state.state_version();

        match self
            .reader
            .get_next_batch(cursor, self.config.max_txns_per_response)
        {
            Ok(Some(batch)) => {
                debug!(
                    %peer,
                    from,
                    to = batch.end().state_version(),
                    txns = batch.txns().len(),
                    "RemoteSync: Serving sync request"
                );
                self.counters.remote_sync_requests_served += 1;
                vec![SyncAction::Send {
                    peer,
                    message: SyncMessage::SyncResponse(SyncResponse::new(batch)),
                }]
            }
            Ok(None) => {
                debug!(%peer, from, "RemoteSync: Nothing to serve");
                self.counters.remote_sync_requests_dropped += 1;
                Vec::new()
            }
            Err(e) => {
                warn!(%peer, from, error = %e, "RemoteSync: Unable to serve sync request");
                self.counters.remote_sync_requests_dropped += 1;
                Vec::new()
            }
        }
    }

    /// Track the new tail and gossip it if the local engine is idle
    pub fn handle_ledger_update(
        &mut self,
        update: &LedgerUpdate,
        local_state: &SyncState,
    ) -> Vec<SyncAction> {
        let tail = update.tail();
        if !tail.is_ahead_of(&self.current_header) {
            return Vec::new();
        }
        self.current_header = tail.clone();

        if !local_state.is_idle() {
            trace!(
                state = local_state.name(),
                "RemoteSync: Not advertising while catching up"
            );
            return Vec::new();
        }

        self.send_status_updates()
    }

    fn send_status_updates(&mut self) -> Vec<SyncAction> {
        let mut peers = self.peers.peers();
        peers.shuffle(&mut rand::thread_rng());
        peers.truncate(self.config.ledger_status_update_max_peers_to_notify);

        let mut actions = Vec::with_capacity(peers.len());
        let mut skipped = 0u64;
        for peer in peers {
            if !self.limiter.try_acquire() {
                skipped += 1;
                continue;
            }
            self.counters.status_updates_sent += 1;
            actions.push(SyncAction::Send {
                peer,
                message: SyncMessage::LedgerStatusUpdate(LedgerStatusUpdate::new(
                    self.current_header.clone(),
                )),
            });
        }

        if skipped > 0 {
            trace!(skipped, "RemoteSync: Status updates rate limited");
            self.counters.status_updates_rate_limited += skipped;
        }
        actions
    }
}
