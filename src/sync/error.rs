// Sync Errors - misuse caught when building services and requests

use crate::identity::NodeId;
use thiserror::Error;

/// Wiring errors rejected when the sync services or requests are built.
///
/// Peer misbehaviour never shows up here; it only moves the state machine on.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SyncError {
    #[error("Invalid sync config: {0}")]
    InvalidConfig(String),

    #[error("Sync request targets the local node {0}")]
    SelfTarget(NodeId),

    #[error("Sync request has no target nodes")]
    NoTargetNodes,
}
