// Events and Actions - what goes into the sync services and what comes out
//
// The services never touch the network, the clock or storage themselves.
// Every input is a SyncEvent and every side effect is a SyncAction that the
// runtime executes.

use crate::identity::NodeId;
use crate::ledger::{LedgerProof, LedgerUpdate};
use crate::sync::messages::{LedgerStatusUpdate, StatusResponse, SyncMessage, SyncResponse};
use crate::sync::SyncError;
use std::time::Duration;

/// Another subsystem asking for the ledger to reach `target`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSyncRequest {
    target_nodes: Vec<NodeId>,
    target: LedgerProof,
}

impl LocalSyncRequest {
    /// Build a request; `local_node` must not appear among the targets
    pub fn new(
        local_node: &NodeId,
        target_nodes: Vec<NodeId>,
        target: LedgerProof,
    ) -> Result<Self, SyncError> {
        if target_nodes.is_empty() {
            return Err(SyncError::NoTargetNodes);
        }
        if target_nodes.contains(local_node) {
            return Err(SyncError::SelfTarget(local_node.clone()));
        }
        Ok(Self {
            target_nodes,
            target,
        })
    }

    pub fn target_nodes(&self) -> &[NodeId] {
        &self.target_nodes
    }

    pub fn target(&self) -> &LedgerProof {
        &self.target
    }
}

/// Fired when a sync request to `peer` went unanswered
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncRequestTimeout {
    pub peer: NodeId,
    pub request_id: u64,
}

/// Fired when a verified batch did not show up as a ledger update in time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncLedgerUpdateTimeout {
    pub state_version: u64,
}

/// One-shot timers the sync services arm
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncTimeout {
    ReceiveStatus,
    Request(SyncRequestTimeout),
    LedgerUpdate(SyncLedgerUpdateTimeout),
}

impl From<SyncTimeout> for SyncEvent {
    fn from(timeout: SyncTimeout) -> Self {
        match timeout {
            SyncTimeout::ReceiveStatus => SyncEvent::SyncCheckReceiveStatusTimeout,
            SyncTimeout::Request(t) => SyncEvent::SyncRequestTimeout(t),
            SyncTimeout::LedgerUpdate(t) => SyncEvent::SyncLedgerUpdateTimeout(t),
        }
    }
}

/// Inputs to the local sync state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    SyncCheckTrigger,
    StatusResponse { peer: NodeId, response: StatusResponse },
    SyncCheckReceiveStatusTimeout,
    SyncResponse { peer: NodeId, response: SyncResponse },
    SyncRequestTimeout(SyncRequestTimeout),
    SyncLedgerUpdateTimeout(SyncLedgerUpdateTimeout),
    LedgerUpdate(LedgerUpdate),
    LocalSyncRequest(LocalSyncRequest),
    LedgerStatusUpdate { peer: NodeId, update: LedgerStatusUpdate },
}

/// Side effects requested by the sync services
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncAction {
    /// Fire-and-forget send to a peer
    Send { peer: NodeId, message: SyncMessage },
    /// Deliver `timeout` back into the inbox after `delay`
    Schedule { timeout: SyncTimeout, delay: Duration },
    /// Hand a verified batch to the commit pipeline
    VerifiedSyncResponse(SyncResponse),
    /// Report a response that failed verification
    InvalidSyncResponse { peer: NodeId, response: SyncResponse },
}
