use ledger_sync::identity::{Keypair, NodeId};
use ledger_sync::ledger::{accumulate, LedgerHeader, LedgerProof, LedgerUpdate, Txn, ValidatorSet};
use ledger_sync::node::{NodeComponents, NodeError, NodeHandle, StoreCommitter, SyncNode};
use ledger_sync::storage::LedgerStore;
use ledger_sync::sync::{LocalSyncRequest, PeerRegistry, SyncConfig, SyncResponseVerifier};
use ledger_sync::transport::LocalNetwork;
use std::sync::{Arc, RwLock};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn fast_config() -> SyncConfig {
    SyncConfig::default()
        .with_sync_check_interval(50)
        .with_status_timeout(50)
        .with_request_timeout(100)
        .with_ledger_update_timeout(200)
        .with_max_txns_per_response(7)
}

struct Cluster {
    keys: Vec<Keypair>,
    ids: Vec<NodeId>,
    stores: Vec<Arc<LedgerStore>>,
    handles: Vec<NodeHandle>,
    network: LocalNetwork,
}

impl Cluster {
    fn start(n: usize) -> Self {
        let keys: Vec<Keypair> = (0..n).map(|_| Keypair::generate()).collect();
        let ids: Vec<NodeId> = keys
            .iter()
            .map(|k| NodeId::from_public_key(&k.public_key()))
            .collect();
        let validators = ValidatorSet::from_keypairs(&keys).unwrap();
        let network = LocalNetwork::new();

        let mut stores = Vec::new();
        let mut handles = Vec::new();
        for id in &ids {
            let store = Arc::new(LedgerStore::temporary(&LedgerProof::genesis()).unwrap());
            let mut registry = PeerRegistry::new(id.clone());
            for peer in ids.iter().filter(|p| *p != id) {
                registry.add_peer(peer.clone()).unwrap();
            }
            let registry = Arc::new(RwLock::new(registry));
            let (transport, inbound) = network.register(id.clone());

            let components = NodeComponents {
                peers: registry.clone(),
                verifier: Box::new(SyncResponseVerifier::new(validators.clone())),
                reader: store.clone(),
                transport: Arc::new(transport),
                inbound,
                handler: Box::new(StoreCommitter::new(store.clone(), registry)),
            };
            let (node, handle) =
                SyncNode::new(id.clone(), fast_config(), store.tail().unwrap(), components).unwrap();
            tokio::spawn(node.run());

            stores.push(store);
            handles.push(handle);
        }

        Self {
            keys,
            ids,
            stores,
            handles,
            network,
        }
    }

    /// Node 0 commits a signed batch of `n` transactions; returns the new version
    fn produce(&self, n: usize, announce: bool) -> u64 {
        let leader = &self.stores[0];
        let tail = leader.tail().unwrap();
        let round = tail.header().round() + 1;
        let txns: Vec<Txn> = (0..n)
            .map(|i| Txn::new(format!("r{}-{}", round, i).into_bytes()))
            .collect();
        let mut acc = *tail.accumulator_state();
        for txn in &txns {
            acc = accumulate(&acc, &txn.id());
        }
        let signers: Vec<&Keypair> = self.keys.iter().collect();
        let proof = LedgerProof::sign(LedgerHeader::new(1, round, acc, 0), &signers);

        let new_tail = leader.commit_local(txns, proof).unwrap().unwrap();
        if announce {
            self.handles[0]
                .ledger_update(LedgerUpdate::new(new_tail.clone()))
                .unwrap();
        }
        new_tail.state_version()
    }

    fn shutdown(&self) {
        for handle in &self.handles {
            let _ = handle.shutdown();
        }
    }
}

// ============================================================================
// CONVERGENCE
// ============================================================================

/// Test: Followers catch up to an announced ledger across several responses
#[tokio::test]
async fn test_followers_converge_on_announced_batches() {
    let cluster = Cluster::start(3);

    let mut target = 0;
    for _ in 0..4 {
        target = cluster.produce(5, true);
    }

    for handle in &cluster.handles[1..] {
        handle.wait_for_version(target, WAIT).await.unwrap();
    }
    for store in &cluster.stores[1..] {
        assert_eq!(store.tail().unwrap(), cluster.stores[0].tail().unwrap());
    }
    cluster.shutdown();
}

/// Test: A follower that missed every announcement finds the leader through the periodic status check
#[tokio::test]
async fn test_periodic_check_discovers_leader_after_missed_gossip() {
    let cluster = Cluster::start(2);
    cluster.network.partition(&cluster.ids[0], &cluster.ids[1]);

    cluster.produce(6, true);
    let target = cluster.produce(6, true);
    // Once the leader has applied its own update the gossip for it is already lost
    cluster.handles[0].wait_for_version(target, WAIT).await.unwrap();
    assert_eq!(cluster.handles[1].status().current_version, 0);

    cluster.network.heal_all();
    cluster.handles[1].wait_for_version(target, WAIT).await.unwrap();

    let status = cluster.handles[1].status();
    assert_eq!(status.current_version, target);
    assert!(
        status.counters.verified_responses >= 2,
        "Responses are capped at 7 transactions, so 12 need two of them"
    );
    cluster.shutdown();
}

/// Test: A partitioned node stays behind and catches up once healed
#[tokio::test]
async fn test_partitioned_node_catches_up_after_heal() {
    let cluster = Cluster::start(3);
    let isolated = cluster.ids[2].clone();
    for id in &cluster.ids[..2] {
        cluster.network.partition(id, &isolated);
    }

    let target = cluster.produce(6, true);
    cluster.handles[1].wait_for_version(target, WAIT).await.unwrap();
    assert_eq!(
        cluster.handles[2]
            .wait_for_version(target, Duration::from_millis(300))
            .await,
        Err(NodeError::Timeout(target))
    );

    cluster.network.heal_all();
    cluster.handles[2].wait_for_version(target, WAIT).await.unwrap();
    assert_eq!(cluster.stores[2].tail().unwrap().state_version(), target);
    cluster.shutdown();
}

/// Test: A local sync request toward a known header drives the node there
#[tokio::test]
async fn test_local_sync_request() {
    let cluster = Cluster::start(2);
    let target = cluster.produce(3, false);
    let target_header = cluster.stores[0].tail().unwrap();

    let request = LocalSyncRequest::new(&cluster.ids[1], vec![cluster.ids[0].clone()], target_header)
        .expect("Valid request");
    cluster.handles[1].request_sync(request).unwrap();

    cluster.handles[1].wait_for_version(target, WAIT).await.unwrap();
    cluster.shutdown();
}

// ============================================================================
// LIFECYCLE
// ============================================================================

/// Test: After shutdown the handle reports the node as stopped
#[tokio::test]
async fn test_shutdown_stops_node() {
    let cluster = Cluster::start(2);
    let handle = cluster.handles[1].clone();

    handle.shutdown().unwrap();

    assert_eq!(
        handle.wait_for_version(100, WAIT).await,
        Err(NodeError::Stopped)
    );
    assert_eq!(
        handle.ledger_update(LedgerUpdate::new(LedgerProof::genesis())),
        Err(NodeError::Stopped)
    );
    cluster.shutdown();
}
