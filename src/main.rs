// syncnode - run a local network of sync nodes
//
// Node 0 stands in for consensus: it commits batches signed by the whole
// validator set and announces them. Every other node starts at genesis and
// has to catch up through the sync protocol.

use clap::{Parser, Subcommand};
use ledger_sync::identity::{Keypair, NodeId};
use ledger_sync::ledger::{accumulate, LedgerHeader, LedgerProof, LedgerUpdate, Txn, ValidatorSet};
use ledger_sync::node::{NodeComponents, NodeHandle, StoreCommitter, SyncNode};
use ledger_sync::storage::LedgerStore;
use ledger_sync::sync::{PeerRegistry, SyncConfig, SyncResponseVerifier};
use ledger_sync::transport::LocalNetwork;
use std::error::Error;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "syncnode")]
#[command(about = "Ledger synchronization node", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run N nodes on an in-process network while node 0 produces batches
    Simulate {
        #[arg(long, default_value_t = 4)]
        nodes: usize,
        #[arg(long, default_value_t = 20)]
        batches: u64,
        #[arg(long, default_value_t = 10)]
        txns_per_batch: usize,
        /// Give up waiting for convergence after this long
        #[arg(long, default_value_t = 30)]
        duration_secs: u64,
        /// Cut the last K nodes off until half the batches are produced
        #[arg(long)]
        partition: Option<usize>,
        #[arg(long, default_value_t = 500)]
        sync_check_interval_ms: u64,
        #[arg(long, default_value_t = 100)]
        batch_interval_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            nodes,
            batches,
            txns_per_batch,
            duration_secs,
            partition,
            sync_check_interval_ms,
            batch_interval_ms,
        } => {
            let sim = Simulation {
                nodes,
                batches,
                txns_per_batch,
                duration: Duration::from_secs(duration_secs),
                partition: partition.unwrap_or(0),
                batch_interval: Duration::from_millis(batch_interval_ms),
                config: SyncConfig::default()
                    .with_sync_check_interval(sync_check_interval_ms)
                    .with_status_timeout(sync_check_interval_ms)
                    .with_request_timeout(sync_check_interval_ms),
            };
            simulate(sim).await?
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct Simulation {
    nodes: usize,
    batches: u64,
    txns_per_batch: usize,
    duration: Duration,
    partition: usize,
    batch_interval: Duration,
    config: SyncConfig,
}

async fn simulate(sim: Simulation) -> Result<(), Box<dyn Error>> {
    if sim.nodes < 2 {
        return Err("simulation needs at least two nodes".into());
    }
    sim.config.validate()?;

    let keys: Vec<Keypair> = (0..sim.nodes).map(|_| Keypair::generate()).collect();
    let ids: Vec<NodeId> = keys.iter().map(|k| NodeId::from_public_key(&k.public_key())).collect();
    let validators = ValidatorSet::from_keypairs(&keys)?;
    let genesis = LedgerProof::genesis();
    let network = LocalNetwork::new();

    let mut handles: Vec<NodeHandle> = Vec::with_capacity(sim.nodes);
    let mut leader_store = None;
    for id in &ids {
        let store = Arc::new(LedgerStore::temporary(&genesis)?);
        let mut registry = PeerRegistry::new(id.clone());
        for peer in ids.iter().filter(|p| *p != id) {
            registry.add_peer(peer.clone())?;
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
        let (node, handle) = SyncNode::new(id.clone(), sim.config.clone(), store.tail()?, components)?;
        tokio::spawn(node.run());

        if leader_store.is_none() {
            leader_store = Some(store);
        }
        handles.push(handle);
    }
    let leader_store = leader_store.ok_or("no leader")?;

    let isolated = &ids[sim.nodes - sim.partition.min(sim.nodes - 1)..];
    for a in isolated {
        for b in ids.iter().filter(|b| !isolated.contains(b)) {
            network.partition(a, b);
        }
    }
    if !isolated.is_empty() {
        info!(nodes = isolated.len(), "Partitioned trailing nodes");
    }

    // Node 0 produces the ledger
    let signers: Vec<&Keypair> = keys.iter().collect();
    for round in 1..=sim.batches {
        let tail = leader_store.tail()?;
        let txns: Vec<Txn> = (0..sim.txns_per_batch)
            .map(|i| Txn::new(format!("round-{}-txn-{}", round, i).into_bytes()))
            .collect();
        let mut acc = *tail.accumulator_state();
        for txn in &txns {
            acc = accumulate(&acc, &txn.id());
        }
        let proof = LedgerProof::sign(LedgerHeader::new(1, round, acc, now_ms()), &signers);

        if let Some(new_tail) = leader_store.commit_local(txns, proof)? {
            handles[0].ledger_update(LedgerUpdate::new(new_tail))?;
        }

        if round == (sim.batches / 2).max(1) && !isolated.is_empty() {
            network.heal_all();
            info!(round, "Healed partition");
        }
        tokio::time::sleep(sim.batch_interval).await;
    }

    let target = leader_store.tail()?.state_version();
    info!(target, "Leader finished producing, waiting for convergence");

    for handle in &handles {
        if let Err(e) = handle.wait_for_version(target, sim.duration).await {
            warn!(node = %handle.node_id(), error = %e, "Node did not converge");
        }
    }

    for (i, handle) in handles.iter().enumerate() {
        let status = handle.status();
        println!(
            "node {} {} state={} version={}/{} requests={} verified={} invalid={} timeouts={}",
            i,
            handle.node_id(),
            status.state,
            status.current_version,
            target,
            status.counters.sync_requests_sent,
            status.counters.verified_responses,
            status.counters.invalid_responses,
            status.counters.sync_request_timeouts,
        );
        let _ = handle.shutdown();
    }

    let stats = network.stats();
    println!(
        "network: sent={} dropped={} bytes={}",
        stats.messages_sent, stats.messages_dropped, stats.bytes_sent
    );
    Ok(())
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
