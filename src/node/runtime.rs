// Sync Node Runtime - drives the sync services on tokio
//
// One task owns both services and processes one event at a time:
// - inbound messages from the transport
// - the periodic sync check tick
// - fired timers, local sync requests, ledger updates, shutdown
//
// Timers are plain spawned sleeps that post back into the inbox; the
// services drop the ones that no longer apply.

use crate::identity::NodeId;
use crate::ledger::{LedgerProof, LedgerUpdate};
use crate::node::SyncResponseHandler;
use crate::storage::CommittedReader;
use crate::sync::{
    LocalSyncRequest, LocalSyncService, PeersView, RemoteSyncService, ResponseVerifier, SyncAction,
    SyncConfig, SyncCounters, SyncError, SyncEvent, SyncMessage, SyncState, SyncTimeout,
};
use crate::transport::{Envelope, SyncTransport};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

/// Errors talking to a running node
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NodeError {
    #[error("Node has shut down")]
    Stopped,

    #[error("Timed out waiting for version {0}")]
    Timeout(u64),
}

/// Inputs to a node other than peer messages
#[derive(Debug)]
pub enum NodeEvent {
    Timeout(SyncTimeout),
    LocalSyncRequest(LocalSyncRequest),
    LedgerUpdate(LedgerUpdate),
    Shutdown,
}

/// Snapshot published after every event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatus {
    pub state: &'static str,
    pub current_version: u64,
    pub counters: SyncCounters,
}

/// Collaborators a node is built from
pub struct NodeComponents {
    pub peers: Arc<dyn PeersView>,
    pub verifier: Box<dyn ResponseVerifier>,
    pub reader: Arc<dyn CommittedReader>,
    pub transport: Arc<dyn SyncTransport>,
    pub inbound: mpsc::UnboundedReceiver<Envelope>,
    pub handler: Box<dyn SyncResponseHandler>,
}

/// Cloneable control surface for a running node
#[derive(Clone)]
pub struct NodeHandle {
    node_id: NodeId,
    inbox: mpsc::UnboundedSender<NodeEvent>,
    status: watch::Receiver<NodeStatus>,
}

impl NodeHandle {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn status(&self) -> NodeStatus {
        self.status.borrow().clone()
    }

    pub fn request_sync(&self, request: LocalSyncRequest) -> Result<(), NodeError> {
        self.post(NodeEvent::LocalSyncRequest(request))
    }

    /// Report a ledger advance made outside the sync engine (e.g. local consensus)
    pub fn ledger_update(&self, update: LedgerUpdate) -> Result<(), NodeError> {
        self.post(NodeEvent::LedgerUpdate(update))
    }

    pub fn shutdown(&self) -> Result<(), NodeError> {
        self.post(NodeEvent::Shutdown)
    }

    /// Wait until the node's ledger reaches `version`
    pub async fn wait_for_version(&self, version: u64, timeout: Duration) -> Result<(), NodeError> {
        let mut status = self.status.clone();
        let reached = tokio::time::timeout(timeout, async {
            status
                .wait_for(|s| s.current_version >= version)
                .await
                .map(|_| ())
        })
        .await;

        match reached {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(NodeError::Stopped),
            Err(_) => Err(NodeError::Timeout(version)),
        }
    }

    fn post(&self, event: NodeEvent) -> Result<(), NodeError> {
        self.inbox.send(event).map_err(|_| NodeError::Stopped)
    }
}

/// A node running the local and remote sync services
pub struct SyncNode {
    node_id: NodeId,
    sync_check_interval: Duration,
    local: LocalSyncService,
    remote: RemoteSyncService,
    transport: Arc<dyn SyncTransport>,
    handler: Box<dyn SyncResponseHandler>,
    inbound: mpsc::UnboundedReceiver<Envelope>,
    inbox_tx: mpsc::UnboundedSender<NodeEvent>,
    inbox_rx: mpsc::UnboundedReceiver<NodeEvent>,
    status: watch::Sender<NodeStatus>,
}

impl SyncNode {
    /// Build a node starting idle at `current` (the persisted ledger tail)
    pub fn new(
        node_id: NodeId,
        config: SyncConfig,
        current: LedgerProof,
        components: NodeComponents,
    ) -> Result<(Self, NodeHandle), SyncError> {
        let NodeComponents {
            peers,
            verifier,
            reader,
            transport,
            inbound,
            handler,
        } = components;

        let sync_check_interval = config.sync_check_interval();
        let remote =
            RemoteSyncService::new(config.clone(), peers.clone(), reader, current.clone())?;
        let local = LocalSyncService::new(config, peers, verifier, SyncState::idle(current))?;

        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (status, status_rx) = watch::channel(snapshot(&local));

        let handle = NodeHandle {
            node_id: node_id.clone(),
            inbox: inbox_tx.clone(),
            status: status_rx,
        };
        let node = Self {
            node_id,
            sync_check_interval,
            local,
            remote,
            transport,
            handler,
            inbound,
            inbox_tx,
            inbox_rx,
            status,
        };
        Ok((node, handle))
    }

    /// Process events until shutdown
    pub async fn run(mut self) {
        info!(node = %self.node_id, "Sync node started");

        let mut ticker = tokio::time::interval(self.sync_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let actions = self.local.handle(SyncEvent::SyncCheckTrigger);
                    self.execute(actions).await;
                }
                Some(envelope) = self.inbound.recv() => {
                    self.on_message(envelope).await;
                }
                event = self.inbox_rx.recv() => match event {
                    Some(NodeEvent::Shutdown) | None => break,
                    Some(event) => self.on_event(event).await,
                },
            }
            self.publish_status();
        }

        info!(
            node = %self.node_id,
            version = self.local.state().current().state_version(),
            "Sync node stopped"
        );
    }

    async fn on_message(&mut self, envelope: Envelope) {
        let Envelope { from, message } = envelope;
        trace!(node = %self.node_id, %from, kind = ?message.message_type(), "Received message");

        let actions = match message {
            SyncMessage::StatusRequest(_) => self.remote.handle_status_request(from),
            SyncMessage::SyncRequest(request) => self.remote.handle_sync_request(from, &request),
            SyncMessage::StatusResponse(response) => self.local.handle(SyncEvent::StatusResponse {
                peer: from,
                response,
            }),
            SyncMessage::SyncResponse(response) => self.local.handle(SyncEvent::SyncResponse {
                peer: from,
                response,
            }),
            SyncMessage::LedgerStatusUpdate(update) => {
                self.local.handle(SyncEvent::LedgerStatusUpdate { peer: from, update })
            }
        };
        self.execute(actions).await;
    }

    async fn on_event(&mut self, event: NodeEvent) {
        let actions = match event {
            NodeEvent::Timeout(timeout) => self.local.handle(timeout.into()),
            NodeEvent::LocalSyncRequest(request) => {
                self.local.handle(SyncEvent::LocalSyncRequest(request))
            }
            NodeEvent::LedgerUpdate(update) => {
                let mut actions = self.local.handle(SyncEvent::LedgerUpdate(update.clone()));
                actions.extend(self.remote.handle_ledger_update(&update, self.local.state()));
                actions
            }
            NodeEvent::Shutdown => Vec::new(),
        };
        self.execute(actions).await;
    }

    async fn execute(&mut self, actions: Vec<SyncAction>) {
        for action in actions {
            match action {
                SyncAction::Send { peer, message } => {
                    if let Err(e) = self.transport.send(&peer, message).await {
                        debug!(node = %self.node_id, %peer, error = %e, "Send failed");
                    }
                }
                SyncAction::Schedule { timeout, delay } => {
                    let inbox = self.inbox_tx.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        // The node may be gone by now
                        let _ = inbox.send(NodeEvent::Timeout(timeout));
                    });
                }
                SyncAction::VerifiedSyncResponse(response) => {
                    if let Some(update) = self.handler.on_verified(response) {
                        let _ = self.inbox_tx.send(NodeEvent::LedgerUpdate(update));
                    }
                }
                SyncAction::InvalidSyncResponse { peer, response } => {
                    self.handler.on_invalid(&peer, &response);
                }
            }
        }
    }

    fn publish_status(&self) {
        let next = snapshot(&self.local);
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}

fn snapshot(local: &LocalSyncService) -> NodeStatus {
    NodeStatus {
        state: local.state().name(),
        current_version: local.state().current().state_version(),
        counters: local.counters().clone(),
    }
}
