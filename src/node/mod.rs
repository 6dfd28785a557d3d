// Node module - RUNNING IT
// Wires the sync services to a transport, a timer source and the commit pipeline

mod handler;
mod runtime;

pub use handler::{StoreCommitter, SyncResponseHandler};
pub use runtime::{NodeComponents, NodeError, NodeEvent, NodeHandle, NodeStatus, SyncNode};
