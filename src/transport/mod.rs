// Transport module - THE WIRE (abstract)
// Fire-and-forget delivery of sync messages, plus an in-process network

mod local;
mod traits;

pub use local::{LocalNetwork, LocalTransport};
pub use traits::{Envelope, SyncTransport, TransportError, TransportStats};
