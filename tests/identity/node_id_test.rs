use ledger_sync::identity::{Keypair, NodeId};
use std::collections::HashSet;

/// Test: Node id is a pure function of the public key
#[test]
fn test_node_id_deterministic() {
    let keypair = Keypair::generate();

    assert_eq!(
        NodeId::from_public_key(&keypair.public_key()),
        NodeId::from_public_key(&keypair.public_key())
    );
}

/// Test: Different keys give different node ids
#[test]
fn test_different_keys_different_ids() {
    let ids: HashSet<NodeId> = (0..16)
        .map(|_| NodeId::from_public_key(&Keypair::generate().public_key()))
        .collect();

    assert_eq!(ids.len(), 16);
}
