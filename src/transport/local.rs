// Local Transport Implementation
// In-process network connecting sync nodes through channels
//
// Every message is encoded and decoded on the way through, so the wire
// codec is exercised exactly as a socket transport would. Links can be cut
// with partition() to simulate network splits.

use crate::identity::NodeId;
use crate::sync::SyncMessage;
use crate::transport::{Envelope, SyncTransport, TransportError, TransportStats};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Default)]
struct NetworkInner {
    endpoints: HashMap<NodeId, mpsc::UnboundedSender<Envelope>>,
    /// Cut links, stored with the smaller id first
    partitions: HashSet<(NodeId, NodeId)>,
    stats: TransportStats,
}

/// Shared hub all local transports deliver through
#[derive(Clone, Default)]
pub struct LocalNetwork {
    inner: Arc<RwLock<NetworkInner>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node; returns its transport and the receiver for its inbound messages
    pub fn register(&self, node_id: NodeId) -> (LocalTransport, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.write().endpoints.insert(node_id.clone(), tx);
        let transport = LocalTransport {
            local: node_id,
            network: self.clone(),
        };
        (transport, rx)
    }

    /// Cut the link between two nodes in both directions
    pub fn partition(&self, a: &NodeId, b: &NodeId) {
        self.write().partitions.insert(link(a, b));
    }

    pub fn heal_all(&self) {
        self.write().partitions.clear();
    }

    pub fn stats(&self) -> TransportStats {
        self.read().stats.clone()
    }

    fn deliver(&self, from: &NodeId, to: &NodeId, bytes: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.write();

        if inner.partitions.contains(&link(from, to)) {
            inner.stats.messages_dropped += 1;
            return Err(TransportError::Unreachable(to.clone()));
        }

        let endpoint = match inner.endpoints.get(to) {
            Some(endpoint) => endpoint.clone(),
            None => {
                inner.stats.messages_dropped += 1;
                return Err(TransportError::UnknownPeer(to.clone()));
            }
        };

        let message = SyncMessage::from_bytes(bytes)
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;
        let envelope = Envelope {
            from: from.clone(),
            message,
        };

        if endpoint.send(envelope).is_err() {
            inner.stats.messages_dropped += 1;
            return Err(TransportError::SendFailed(format!("{} has shut down", to)));
        }

        inner.stats.messages_sent += 1;
        inner.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, NetworkInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, NetworkInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn link(a: &NodeId, b: &NodeId) -> (NodeId, NodeId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

/// One node's handle onto a LocalNetwork
#[derive(Clone)]
pub struct LocalTransport {
    local: NodeId,
    network: LocalNetwork,
}

#[async_trait]
impl SyncTransport for LocalTransport {
    async fn send(&self, to: &NodeId, message: SyncMessage) -> Result<(), TransportError> {
        let bytes = message
            .to_bytes()
            .map_err(|e| TransportError::SerializationError(e.to_string()))?;

        trace!(
            from = %self.local,
            %to,
            kind = ?message.message_type(),
            bytes = bytes.len(),
            "Delivering message"
        );
        self.network.deliver(&self.local, to, &bytes)
    }
}
