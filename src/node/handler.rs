// Sync Response Handling - where verified batches go
//
// The local sync engine only decides; committing a verified batch and
// punishing a peer for an invalid one happen here.

use crate::identity::NodeId;
use crate::ledger::LedgerUpdate;
use crate::storage::LedgerStore;
use crate::sync::{PeerRegistry, SyncResponse};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Consumer of the sync engine's verdicts
pub trait SyncResponseHandler: Send {
    /// Commit a verified batch; returns the update to feed back if the ledger advanced
    fn on_verified(&mut self, response: SyncResponse) -> Option<LedgerUpdate>;

    fn on_invalid(&mut self, peer: &NodeId, response: &SyncResponse);
}

/// Commits verified batches to a LedgerStore and bans repeat offenders
pub struct StoreCommitter {
    store: Arc<LedgerStore>,
    peers: Arc<RwLock<PeerRegistry>>,
}

impl StoreCommitter {
    pub fn new(store: Arc<LedgerStore>, peers: Arc<RwLock<PeerRegistry>>) -> Self {
        Self { store, peers }
    }
}

impl SyncResponseHandler for StoreCommitter {
    fn on_verified(&mut self, response: SyncResponse) -> Option<LedgerUpdate> {
        match self.store.commit(response.batch()) {
            Ok(Some(tail)) => Some(LedgerUpdate::new(tail)),
            Ok(None) => {
                debug!(
                    version = response.batch().end().state_version(),
                    "Verified batch already committed"
                );
                None
            }
            Err(e) => {
                warn!(error = %e, "Failed to commit verified batch");
                None
            }
        }
    }

    fn on_invalid(&mut self, peer: &NodeId, _response: &SyncResponse) {
        let mut registry = self.peers.write().unwrap_or_else(|e| e.into_inner());
        match registry.record_invalid_response(peer) {
            Ok(true) => warn!(%peer, "Banning peer after repeated invalid sync responses"),
            Ok(false) => {}
            Err(e) => debug!(%peer, error = %e, "Invalid response from unknown peer"),
        }
    }
}
