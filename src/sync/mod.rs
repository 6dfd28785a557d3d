// Sync module - HOW NODES CATCH UP
// Local sync state machine, remote responder, wire messages and verification

mod config;
mod counters;
mod error;
mod events;
mod local;
mod messages;
mod peers;
mod rate_limit;
mod remote;
mod state;
mod verifier;

pub use config::SyncConfig;
pub use counters::SyncCounters;
pub use error::SyncError;
pub use events::{
    LocalSyncRequest, SyncAction, SyncEvent, SyncLedgerUpdateTimeout, SyncRequestTimeout,
    SyncTimeout,
};
pub use local::LocalSyncService;
pub use messages::{
    LedgerStatusUpdate, MessageType, ProtocolError, StatusRequest, StatusResponse, SyncMessage,
    SyncRequest, SyncResponse, MAX_MESSAGE_SIZE,
};
pub use peers::{PeerError, PeerInfo, PeerRegistry, PeerState, PeersView, MAX_INVALID_RESPONSES};
pub use rate_limit::RateLimiter;
pub use remote::RemoteSyncService;
pub use state::{CheckingStatusState, IdleState, PendingRequest, SyncState, SyncingState};
pub use verifier::{
    AccumulatorVerifier, ResponseVerifier, SignaturesVerifier, SyncResponseVerifier,
    ValidatorSetVerifier,
};
