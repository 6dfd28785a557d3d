// Peer Management - which peers the sync engine may talk to
//
// The sync services only need a read-only view of the current peer set.
// PeerRegistry is the concrete directory the node runtime maintains.

use crate::identity::NodeId;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Invalid sync responses tolerated before a peer is banned
pub const MAX_INVALID_RESPONSES: u32 = 3;

/// Read-only view of the peers this node can reach
pub trait PeersView: Send + Sync {
    /// Currently reachable peers, never including the local node
    fn peers(&self) -> Vec<NodeId>;

    fn has_peer(&self, node_id: &NodeId) -> bool {
        self.peers().contains(node_id)
    }
}

/// Peer-related errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PeerError {
    #[error("Cannot add self as a peer")]
    CannotAddSelf,

    #[error("Peer not found")]
    PeerNotFound,
}

/// State of a peer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    Connected,
    /// Sent too many invalid sync responses
    Banned,
}

/// Information about a known peer
#[derive(Clone, Debug)]
pub struct PeerInfo {
    node_id: NodeId,
    state: PeerState,
    invalid_responses: u32,
}

impl PeerInfo {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            state: PeerState::Connected,
            invalid_responses: 0,
        }
    }

    pub fn state(&self) -> PeerState {
        self.state
    }
}

/// Registry of known peers
#[derive(Clone, Debug)]
pub struct PeerRegistry {
    my_node_id: NodeId,
    peers: HashMap<NodeId, PeerInfo>,
}

impl PeerRegistry {
    pub fn new(my_node_id: NodeId) -> Self {
        Self {
            my_node_id,
            peers: HashMap::new(),
        }
    }

    pub fn get_peer(&self, node_id: &NodeId) -> Option<&PeerInfo> {
        self.peers.get(node_id)
    }

    /// Add a peer; re-adding a known one is a no-op (bans stick)
    pub fn add_peer(&mut self, node_id: NodeId) -> Result<(), PeerError> {
        if node_id == self.my_node_id {
            return Err(PeerError::CannotAddSelf);
        }

        self.peers
            .entry(node_id.clone())
            .or_insert_with(|| PeerInfo::new(node_id));

        Ok(())
    }

    /// Count an invalid sync response; returns true if this banned the peer
    pub fn record_invalid_response(&mut self, node_id: &NodeId) -> Result<bool, PeerError> {
        let peer = self.peers.get_mut(node_id).ok_or(PeerError::PeerNotFound)?;
        peer.invalid_responses = peer.invalid_responses.saturating_add(1);
        if peer.state != PeerState::Banned && peer.invalid_responses >= MAX_INVALID_RESPONSES {
            peer.state = PeerState::Banned;
            return Ok(true);
        }
        Ok(false)
    }

    /// Peers in the Connected state
    pub fn connected_peers(&self) -> Vec<NodeId> {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .map(|p| p.node_id.clone())
            .collect()
    }
}

impl PeersView for PeerRegistry {
    fn peers(&self) -> Vec<NodeId> {
        self.connected_peers()
    }

    fn has_peer(&self, node_id: &NodeId) -> bool {
        self.peers
            .get(node_id)
            .is_some_and(|p| p.state == PeerState::Connected)
    }
}

impl PeersView for RwLock<PeerRegistry> {
    fn peers(&self) -> Vec<NodeId> {
        self.read().unwrap_or_else(|e| e.into_inner()).peers()
    }

    fn has_peer(&self, node_id: &NodeId) -> bool {
        self.read().unwrap_or_else(|e| e.into_inner()).has_peer(node_id)
    }
}
