use ledger_sync::identity::{Keypair, NodeId};
use ledger_sync::ledger::{
    accumulate, AccumulatorState, Hash, LedgerHeader, LedgerProof, LedgerUpdate, ValidatorSet,
};
use std::cmp::Ordering;

fn header_at(version: u64) -> LedgerHeader {
    let mut acc = AccumulatorState::genesis();
    for i in 0..version {
        acc = accumulate(&acc, &Hash::of(&i.to_be_bytes()));
    }
    LedgerHeader::new(1, version, acc, 1_700_000_000_000)
}

// ============================================================================
// VALIDATOR SETS
// ============================================================================

/// Test: Voting power is weighted, not counted per head
#[test]
fn test_weighted_quorum() {
    let big = Keypair::generate();
    let small: Vec<Keypair> = (0..3).map(|_| Keypair::generate()).collect();

    let mut members = vec![(big.public_key(), 7)];
    members.extend(small.iter().map(|k| (k.public_key(), 1)));
    let set = ValidatorSet::new(members).expect("Valid set");

    assert_eq!(set.total_power(), 10);
    assert!(set.is_quorum(7), "7 of 10 is more than two thirds");
    assert!(!set.is_quorum(6), "6 of 10 is not");
}

/// Test: Members are looked up by node id
#[test]
fn test_lookup_by_node_id() {
    let keys: Vec<Keypair> = (0..3).map(|_| Keypair::generate()).collect();
    let set = ValidatorSet::from_keypairs(&keys).unwrap();

    let id = NodeId::from_public_key(&keys[1].public_key());
    assert_eq!(set.get(&id).map(|v| v.power()), Some(1));
    assert!(set.get(&NodeId::generate()).is_none());
}

// ============================================================================
// PROOFS
// ============================================================================

/// Test: Genesis is unsigned and sits at version zero
#[test]
fn test_genesis() {
    let genesis = LedgerProof::genesis();

    assert_eq!(genesis.state_version(), 0);
    assert!(genesis.signatures().is_empty());
    assert_eq!(genesis.accumulator_state(), &AccumulatorState::genesis());
}

/// Test: The signing digest changes with every header field
#[test]
fn test_signing_hash_covers_header() {
    let base = header_at(3);
    let same = header_at(3);
    let other_round = LedgerHeader::new(1, 4, *base.accumulator_state(), base.timestamp_ms());
    let other_epoch = LedgerHeader::new(2, 3, *base.accumulator_state(), base.timestamp_ms());
    let other_time = LedgerHeader::new(1, 3, *base.accumulator_state(), 0);

    assert_eq!(base.signing_hash(), same.signing_hash());
    assert_ne!(base.signing_hash(), other_round.signing_hash());
    assert_ne!(base.signing_hash(), other_epoch.signing_hash());
    assert_ne!(base.signing_hash(), other_time.signing_hash());
}

/// Test: Announcing the next validator set is part of what gets signed
#[test]
fn test_signing_hash_covers_next_validator_set() {
    let keys = vec![Keypair::generate()];
    let set = ValidatorSet::from_keypairs(&keys).unwrap();

    let plain = header_at(2);
    let with_set = header_at(2).with_next_validator_set(set.clone());

    assert_ne!(plain.signing_hash(), with_set.signing_hash());
    assert_eq!(with_set.next_validator_set(), Some(&set));
}

/// Test: Proofs order by accumulator version
#[test]
fn test_proof_ordering() {
    let low = LedgerProof::sign(header_at(2), &[]);
    let high = LedgerProof::sign(header_at(5), &[]);

    assert_eq!(high.compare(&low), Ordering::Greater);
    assert!(high.is_ahead_of(&low));
    assert!(!low.is_ahead_of(&low));
}

/// Test: The descriptor carries the position without the signatures
#[test]
fn test_descriptor() {
    let key = Keypair::generate();
    let proof = LedgerProof::sign(header_at(4), &[&key]);
    let descriptor = proof.descriptor();

    assert_eq!(descriptor.epoch, 1);
    assert_eq!(descriptor.round, 4);
    assert_eq!(&descriptor.accumulator_state, proof.accumulator_state());
}

/// Test: A ledger update exposes the new tail
#[test]
fn test_ledger_update() {
    let proof = LedgerProof::sign(header_at(9), &[]);
    let update = LedgerUpdate::new(proof.clone());
    assert_eq!(update.tail(), &proof);
}
