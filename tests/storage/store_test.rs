use ledger_sync::ledger::{
    accumulate, AccumulatorState, Hash, LedgerHeader, LedgerProof, LedgerProofDescriptor, Txn,
    TxnsAndProof,
};
use ledger_sync::storage::{CommittedReader, LedgerStore, StoreError};
use std::collections::BTreeMap;
use tempfile::TempDir;

/// Transactions with the accumulator after each one; index 0 is genesis
struct History {
    txns: Vec<Txn>,
    accs: Vec<AccumulatorState>,
}

impl History {
    fn new(len: usize) -> Self {
        let mut accs = vec![AccumulatorState::genesis()];
        let txns: Vec<Txn> = (0..len)
            .map(|i| Txn::new(format!("txn-{}", i).into_bytes()))
            .collect();
        for txn in &txns {
            let next = accumulate(accs.last().unwrap(), &txn.id());
            accs.push(next);
        }
        Self { txns, accs }
    }

    fn proof(&self, version: u64) -> LedgerProof {
        LedgerProof::new(
            LedgerHeader::new(1, version, self.accs[version as usize], 0),
            BTreeMap::new(),
        )
    }

    fn cursor(&self, version: u64) -> LedgerProofDescriptor {
        self.proof(version).descriptor()
    }

    fn batch(&self, from: u64, to: u64) -> TxnsAndProof {
        TxnsAndProof::new(
            self.txns[from as usize..to as usize].to_vec(),
            self.cursor(from),
            self.proof(to),
        )
    }
}

fn create_test_store() -> (LedgerStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = LedgerStore::open(temp_dir.path(), &LedgerProof::genesis()).unwrap();
    (store, temp_dir)
}

// ============================================================================
// OPEN
// ============================================================================

/// Test: A fresh store starts at genesis
#[test]
fn test_open_seeds_genesis() {
    let (store, _dir) = create_test_store();

    assert_eq!(store.tail().unwrap(), LedgerProof::genesis());
    assert_eq!(store.accumulator_at(0).unwrap(), Some(AccumulatorState::genesis()));
    assert!(store.txn_at(1).unwrap().is_none());
}

/// Test: Committed data survives closing and reopening
#[test]
fn test_reopen_keeps_ledger() {
    let history = History::new(5);
    let temp_dir = TempDir::new().unwrap();

    {
        let store = LedgerStore::open(temp_dir.path(), &LedgerProof::genesis()).unwrap();
        store.commit(&history.batch(0, 5)).unwrap();
        store.flush().unwrap();
    }

    let store = LedgerStore::open(temp_dir.path(), &LedgerProof::genesis()).unwrap();
    assert_eq!(store.tail().unwrap().state_version(), 5, "Genesis must not overwrite the tail");
    assert_eq!(store.txn_at(3).unwrap(), Some(history.txns[2].clone()));
}

// ============================================================================
// COMMIT
// ============================================================================

/// Test: Committing a batch moves the tail and indexes every transaction
#[test]
fn test_commit_advances_tail() {
    let (store, _dir) = create_test_store();
    let history = History::new(4);

    let tail = store.commit(&history.batch(0, 4)).unwrap();

    assert_eq!(tail, Some(history.proof(4)));
    assert_eq!(store.tail().unwrap(), history.proof(4));
    for v in 1..=4u64 {
        assert_eq!(store.txn_at(v).unwrap(), Some(history.txns[v as usize - 1].clone()));
        assert_eq!(store.accumulator_at(v).unwrap(), Some(history.accs[v as usize]));
    }
}

/// Test: A batch overlapping the tail only appends the new part
#[test]
fn test_commit_skips_overlap() {
    let (store, _dir) = create_test_store();
    let history = History::new(8);
    store.commit(&history.batch(0, 5)).unwrap();

    let tail = store.commit(&history.batch(3, 8)).unwrap();

    assert_eq!(tail.map(|p| p.state_version()), Some(8));
    assert_eq!(store.txn_at(8).unwrap(), Some(history.txns[7].clone()));
}

/// Test: A batch ending at or before the tail is a no-op
#[test]
fn test_commit_stale_batch() {
    let (store, _dir) = create_test_store();
    let history = History::new(6);
    store.commit(&history.batch(0, 6)).unwrap();

    assert!(store.commit(&history.batch(0, 4)).unwrap().is_none());
    assert_eq!(store.tail().unwrap().state_version(), 6);
}

/// Test: A batch starting past the tail leaves a gap and is refused
#[test]
fn test_commit_rejects_gap() {
    let (store, _dir) = create_test_store();
    let history = History::new(8);
    store.commit(&history.batch(0, 5)).unwrap();

    let result = store.commit(&history.batch(6, 8));

    assert!(matches!(result, Err(StoreError::NonContiguous { tail: 5, got: 6 })));
}

/// Test: A batch whose start is on another chain is refused
#[test]
fn test_commit_rejects_foreign_start() {
    let (store, _dir) = create_test_store();
    let ours = History::new(5);
    store.commit(&ours.batch(0, 5)).unwrap();

    let forged_start = LedgerProofDescriptor {
        epoch: 1,
        round: 5,
        accumulator_state: AccumulatorState::new(5, Hash::of(b"elsewhere")),
    };
    let theirs = History::new(8);
    let batch = TxnsAndProof::new(theirs.txns[5..8].to_vec(), forged_start, theirs.proof(8));

    assert!(matches!(
        store.commit(&batch),
        Err(StoreError::AccumulatorMismatch(5))
    ));
}

/// Test: Transactions that do not replay to the end proof are refused and nothing is written
#[test]
fn test_commit_rejects_bad_end() {
    let (store, _dir) = create_test_store();
    let history = History::new(4);
    let mut txns = history.txns.clone();
    txns.swap(0, 1);
    let batch = TxnsAndProof::new(txns, history.cursor(0), history.proof(4));

    assert!(matches!(
        store.commit(&batch),
        Err(StoreError::AccumulatorMismatch(4))
    ));
    assert_eq!(store.tail().unwrap(), LedgerProof::genesis());
    assert!(store.txn_at(1).unwrap().is_none());
}

/// Test: Locally produced transactions are committed on top of the tail
#[test]
fn test_commit_local() {
    let (store, _dir) = create_test_store();
    let history = History::new(3);

    let tail = store.commit_local(history.txns.clone(), history.proof(3)).unwrap();

    assert_eq!(tail, Some(history.proof(3)));
}

// ============================================================================
// SERVING
// ============================================================================

fn store_with_boundaries(history: &History, boundaries: &[u64]) -> (LedgerStore, TempDir) {
    let (store, dir) = create_test_store();
    let mut from = 0;
    for &to in boundaries {
        store.commit(&history.batch(from, to)).unwrap();
        from = to;
    }
    (store, dir)
}

/// Test: The reader returns the furthest proof that fits the size cap
#[test]
fn test_next_batch_respects_cap() {
    let history = History::new(20);
    let (store, _dir) = store_with_boundaries(&history, &[5, 10, 20]);

    let batch = store.get_next_batch(&history.cursor(0), 10).unwrap().unwrap();

    assert_eq!(batch.end().state_version(), 10);
    assert_eq!(batch.txns(), &history.txns[..10]);
    assert_eq!(batch.start(), &history.cursor(0));
}

/// Test: When even the nearest proof exceeds the cap, it is served anyway
#[test]
fn test_next_batch_nearest_when_cap_small() {
    let history = History::new(20);
    let (store, _dir) = store_with_boundaries(&history, &[5, 10, 20]);

    let batch = store.get_next_batch(&history.cursor(0), 3).unwrap().unwrap();

    assert_eq!(batch.end().state_version(), 5);
    assert_eq!(batch.txns().len(), 5);
}

/// Test: A cursor between proofs is served from that point
#[test]
fn test_next_batch_from_mid_batch_cursor() {
    let history = History::new(10);
    let (store, _dir) = store_with_boundaries(&history, &[10]);

    let batch = store.get_next_batch(&history.cursor(4), 100).unwrap().unwrap();

    assert_eq!(batch.txns(), &history.txns[4..10]);
}

/// Test: Nothing to serve at the tail or past it
#[test]
fn test_next_batch_none() {
    let history = History::new(10);
    let (store, _dir) = store_with_boundaries(&history, &[10]);

    assert!(store.get_next_batch(&history.cursor(10), 100).unwrap().is_none());

    let beyond = LedgerProofDescriptor {
        epoch: 1,
        round: 50,
        accumulator_state: AccumulatorState::new(50, Hash::of(b"future")),
    };
    assert!(store.get_next_batch(&beyond, 100).unwrap().is_none());
}

/// Test: A cursor that disagrees with our ledger is an error
#[test]
fn test_next_batch_foreign_cursor() {
    let history = History::new(10);
    let (store, _dir) = store_with_boundaries(&history, &[10]);

    let foreign = LedgerProofDescriptor {
        epoch: 1,
        round: 5,
        accumulator_state: AccumulatorState::new(5, Hash::of(b"fork")),
    };

    assert!(matches!(
        store.get_next_batch(&foreign, 100),
        Err(StoreError::AccumulatorMismatch(5))
    ));
}
