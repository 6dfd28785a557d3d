use ledger_sync::ledger::{
    accumulate, compare_accumulators, verify_accumulator, AccumulatorState, Hash, Txn,
};
use std::cmp::Ordering;

fn txn_ids(n: usize) -> Vec<Hash> {
    (0..n)
        .map(|i| Txn::new(format!("payload-{}", i).into_bytes()).id())
        .collect()
}

fn fold(start: &AccumulatorState, ids: &[Hash]) -> AccumulatorState {
    ids.iter().fold(*start, |acc, id| accumulate(&acc, id))
}

/// Test: Folding a batch in two halves lands on the same state as folding it at once
#[test]
fn test_accumulation_is_incremental() {
    let ids = txn_ids(10);
    let genesis = AccumulatorState::genesis();

    let whole = fold(&genesis, &ids);
    let halfway = fold(&genesis, &ids[..4]);
    let split = fold(&halfway, &ids[4..]);

    assert_eq!(whole, split);
    assert_eq!(whole.state_version(), 10);
}

/// Test: A batch verifies only from its own starting point
#[test]
fn test_verify_depends_on_start() {
    let ids = txn_ids(6);
    let genesis = AccumulatorState::genesis();
    let start = fold(&genesis, &ids[..3]);
    let end = fold(&start, &ids[3..]);

    assert!(verify_accumulator(&start, &ids[3..], &end));
    assert!(
        !verify_accumulator(&genesis, &ids[3..], &end),
        "Same ids from a different parent must not verify"
    );
}

/// Test: An empty batch verifies only against an unchanged state
#[test]
fn test_verify_empty_batch() {
    let start = fold(&AccumulatorState::genesis(), &txn_ids(2));

    assert!(verify_accumulator(&start, &[], &start));
    assert!(!verify_accumulator(&start, &[], &AccumulatorState::genesis()));
}

/// Test: Ordering ignores the hash, only the version counts
#[test]
fn test_comparison_is_version_only() {
    let a = AccumulatorState::new(7, Hash::of(b"a"));
    let b = AccumulatorState::new(7, Hash::of(b"b"));
    let c = AccumulatorState::new(8, Hash::of(b"a"));

    assert_eq!(compare_accumulators(&a, &b), Ordering::Equal);
    assert_eq!(compare_accumulators(&c, &a), Ordering::Greater);
    assert!(c.is_ahead_of(&b));
    assert!(!a.is_ahead_of(&b));
}

/// Test: Transaction ids are content hashes
#[test]
fn test_txn_id_is_content_addressed() {
    assert_eq!(Txn::new(b"x".to_vec()).id(), Txn::new(b"x".to_vec()).id());
    assert_ne!(Txn::new(b"x".to_vec()).id(), Txn::new(b"y".to_vec()).id());
}
