use crate::fixtures::*;
use ledger_sync::identity::NodeId;
use ledger_sync::ledger::{LedgerProof, LedgerUpdate};
use ledger_sync::storage::LedgerStore;
use ledger_sync::sync::{
    RemoteSyncService, SyncAction, SyncConfig, SyncMessage, SyncRequest, SyncState, SyncingState,
};
use std::sync::Arc;

fn responder(peers: Vec<NodeId>, store: Arc<LedgerStore>, config: SyncConfig) -> RemoteSyncService {
    let tail = store.tail().unwrap();
    RemoteSyncService::new(config, Arc::new(StaticPeers(peers)), store, tail).unwrap()
}

fn store_with(chain: &Chain, boundaries: &[u64]) -> Arc<LedgerStore> {
    let store = LedgerStore::temporary(&LedgerProof::genesis()).unwrap();
    let mut from = 0;
    for &to in boundaries {
        store.commit(&chain.batch(from, to)).unwrap();
        from = to;
    }
    Arc::new(store)
}

fn status_updates(actions: &[SyncAction]) -> usize {
    actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                SyncAction::Send {
                    message: SyncMessage::LedgerStatusUpdate(_),
                    ..
                }
            )
        })
        .count()
}

// ============================================================================
// SERVING
// ============================================================================

/// Test: A sync request is answered with the committed batch after its cursor
#[test]
fn test_sync_request_served_from_store() {
    let mut chain = Chain::new(1);
    chain.extend(10);
    chain.extend(10);
    let store = store_with(&chain, &[10, 20]);
    let mut svc = responder(vec![], store, SyncConfig::default());
    let peer = NodeId::generate();

    let actions = svc.handle_sync_request(peer.clone(), &SyncRequest::new(chain.proof_at(10).descriptor()));

    assert_eq!(actions.len(), 1);
    match &actions[0] {
        SyncAction::Send {
            peer: to,
            message: SyncMessage::SyncResponse(response),
        } => {
            assert_eq!(to, &peer);
            assert_eq!(response.batch(), &chain.batch(10, 20));
        }
        other => panic!("unexpected action {:?}", other),
    }
    assert_eq!(svc.counters().remote_sync_requests_served, 1);
}

/// Test: A cursor at our tail gets no answer at all
#[test]
fn test_sync_request_at_tail_dropped() {
    let mut chain = Chain::new(1);
    chain.extend(5);
    let store = store_with(&chain, &[5]);
    let mut svc = responder(vec![], store, SyncConfig::default());

    let actions = svc.handle_sync_request(NodeId::generate(), &SyncRequest::new(chain.proof_at(5).descriptor()));

    assert!(actions.is_empty());
    assert_eq!(svc.counters().remote_sync_requests_dropped, 1);
}

/// Test: A cursor from another chain is dropped, not answered
#[test]
fn test_sync_request_off_chain_dropped() {
    let mut ours = Chain::new(1);
    ours.extend(10);
    let mut theirs = Chain::new(1);
    theirs.extend(3);
    theirs.extend(2);
    let store = store_with(&ours, &[10]);
    let mut svc = responder(vec![], store, SyncConfig::default());

    let actions = svc.handle_sync_request(NodeId::generate(), &SyncRequest::new(theirs.proof_at(5).descriptor()));

    assert!(actions.is_empty());
}

// ============================================================================
// GOSSIP
// ============================================================================

/// Test: No status updates go out while the local engine is syncing
#[test]
fn test_gossip_suppressed_while_syncing() {
    let store = Arc::new(LedgerStore::temporary(&LedgerProof::genesis()).unwrap());
    let mut svc = responder(peers(5), store, SyncConfig::default());
    let syncing = SyncState::Syncing(SyncingState::new(header(1), peers(1), header(9)));

    let actions = svc.handle_ledger_update(&LedgerUpdate::new(header(2)), &syncing);

    assert!(actions.is_empty());
    assert_eq!(svc.current_header().state_version(), 2, "Header is still tracked");
    assert_eq!(svc.counters().status_updates_sent, 0);
}

/// Test: Status updates go out to the sampled peers while idle
#[test]
fn test_gossip_sent_while_idle() {
    let store = Arc::new(LedgerStore::temporary(&LedgerProof::genesis()).unwrap());
    let mut svc = responder(peers(5), store, SyncConfig::default());

    let actions = svc.handle_ledger_update(&LedgerUpdate::new(header(2)), &SyncState::idle(header(2)));

    assert_eq!(status_updates(&actions), 5);
}

/// Test: A fast-advancing ledger is throttled by the token bucket, excess sends are skipped
#[test]
fn test_gossip_rate_limited() {
    let store = Arc::new(LedgerStore::temporary(&LedgerProof::genesis()).unwrap());
    let config = SyncConfig::default().with_max_ledger_updates_rate(3);
    let mut svc = responder(peers(2), store, config);

    let mut sent = 0;
    for version in 1..=5 {
        let actions =
            svc.handle_ledger_update(&LedgerUpdate::new(header(version)), &SyncState::idle(header(version)));
        sent += status_updates(&actions);
    }

    assert_eq!(sent, 3, "Only one second's worth of tokens is available");
    assert_eq!(svc.counters().status_updates_rate_limited, 7);
}

/// Test: Status requests are answered with the latest tracked header
#[test]
fn test_status_request_reflects_latest_header() {
    let store = Arc::new(LedgerStore::temporary(&LedgerProof::genesis()).unwrap());
    let mut svc = responder(vec![], store, SyncConfig::default());
    svc.handle_ledger_update(&LedgerUpdate::new(header(7)), &SyncState::idle(header(7)));

    let actions = svc.handle_status_request(NodeId::generate());

    match &actions[0] {
        SyncAction::Send {
            message: SyncMessage::StatusResponse(response),
            ..
        } => assert_eq!(response.header().state_version(), 7),
        other => panic!("unexpected action {:?}", other),
    }
}
