// Protocol - Message types exchanged between sync peers
//
// Defines the wire format for everything one node sends another:
// - StatusRequest/Response: "what is your latest committed header?"
// - SyncRequest/Response: pull the next committed batch after a cursor
// - LedgerStatusUpdate: push notice that a node's ledger advanced

use crate::ledger::{LedgerProof, LedgerProofDescriptor, TxnsAndProof};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest encoded message accepted off the wire
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Types of messages in the protocol
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    StatusRequest,
    StatusResponse,
    SyncRequest,
    SyncResponse,
    LedgerStatusUpdate,
}

/// Protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed")]
    DeserializationFailed,

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),
}

/// Wrapper for all remote sync messages
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMessage {
    StatusRequest(StatusRequest),
    StatusResponse(StatusResponse),
    SyncRequest(SyncRequest),
    SyncResponse(SyncResponse),
    LedgerStatusUpdate(LedgerStatusUpdate),
}

impl SyncMessage {
    /// Get the message type
    pub fn message_type(&self) -> MessageType {
        match self {
            SyncMessage::StatusRequest(_) => MessageType::StatusRequest,
            SyncMessage::StatusResponse(_) => MessageType::StatusResponse,
            SyncMessage::SyncRequest(_) => MessageType::SyncRequest,
            SyncMessage::SyncResponse(_) => MessageType::SyncResponse,
            SyncMessage::LedgerStatusUpdate(_) => MessageType::LedgerStatusUpdate,
        }
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        let bytes = postcard::to_allocvec(self)
            .map_err(|e| ProtocolError::SerializationFailed(e.to_string()))?;
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    /// Deserialize from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge(bytes.len()));
        }
        postcard::from_bytes(bytes).map_err(|_| ProtocolError::DeserializationFailed)
    }
}

// ============================================================================
// STATUS
// ============================================================================

/// Ask a peer for its latest committed header
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRequest;

/// A peer's latest committed header
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    header: LedgerProof,
}

impl StatusResponse {
    pub fn new(header: LedgerProof) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &LedgerProof {
        &self.header
    }
}

// ============================================================================
// SYNC REQUEST / RESPONSE
// ============================================================================

/// Request for the committed batch that follows `cursor`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequest {
    cursor: LedgerProofDescriptor,
}

impl SyncRequest {
    pub fn new(cursor: LedgerProofDescriptor) -> Self {
        Self { cursor }
    }

    pub fn cursor(&self) -> &LedgerProofDescriptor {
        &self.cursor
    }
}

/// A batch of committed transactions with the proof it ends on
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    batch: TxnsAndProof,
}

impl SyncResponse {
    pub fn new(batch: TxnsAndProof) -> Self {
        Self { batch }
    }

    pub fn batch(&self) -> &TxnsAndProof {
        &self.batch
    }
}

// ============================================================================
// LEDGER STATUS UPDATE
// ============================================================================

/// Unsolicited notice that the sender's ledger advanced to `header`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatusUpdate {
    header: LedgerProof,
}

impl LedgerStatusUpdate {
    pub fn new(header: LedgerProof) -> Self {
        Self { header }
    }

    pub fn header(&self) -> &LedgerProof {
        &self.header
    }
}
