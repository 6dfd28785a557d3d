// Transport Traits and Core Types
// The send surface the sync node needs, and the types shared by implementations

use crate::identity::NodeId;
use crate::sync::SyncMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ENVELOPE
// ============================================================================

/// A message as delivered to the receiving node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: NodeId,
    pub message: SyncMessage,
}

// ============================================================================
// TRANSPORT ERRORS
// ============================================================================

/// Errors that can occur in the transport layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown peer: {0}")]
    UnknownPeer(NodeId),

    #[error("Peer unreachable: {0}")]
    Unreachable(NodeId),

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TransportError {
    /// The peer exists but cannot be reached right now
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::SendFailed(_))
    }
}

// ============================================================================
// TRANSPORT STATISTICS
// ============================================================================

/// Statistics for transport operations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStats {
    /// Total messages delivered
    pub messages_sent: u64,
    /// Messages that could not be delivered
    pub messages_dropped: u64,
    /// Total encoded bytes delivered
    pub bytes_sent: u64,
}

// ============================================================================
// TRANSPORT TRAIT
// ============================================================================

/// Fire-and-forget delivery of sync messages to peers
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Send a message to a peer; delivery is not acknowledged
    async fn send(&self, to: &NodeId, message: SyncMessage) -> Result<(), TransportError>;
}
