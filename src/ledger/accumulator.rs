// Ledger Accumulator - running hash over every committed transaction
//
// A ledger position is (state version, accumulator hash). Each committed
// transaction advances the version by one and folds its ID into the hash,
// so replaying a list of IDs from one position must land exactly on the next.

use crate::ledger::Hash;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A position in the ledger
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccumulatorState {
    state_version: u64,
    accumulator_hash: Hash,
}

impl AccumulatorState {
    pub fn new(state_version: u64, accumulator_hash: Hash) -> Self {
        Self {
            state_version,
            accumulator_hash,
        }
    }

    /// Position of an empty ledger
    pub fn genesis() -> Self {
        Self::new(0, Hash::zero())
    }

    pub fn state_version(&self) -> u64 {
        self.state_version
    }

    pub fn accumulator_hash(&self) -> &Hash {
        &self.accumulator_hash
    }

    /// True if `self` is strictly ahead of `other`
    pub fn is_ahead_of(&self, other: &AccumulatorState) -> bool {
        compare_accumulators(self, other) == Ordering::Greater
    }
}

impl fmt::Debug for AccumulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Acc(v{}, {:?})", self.state_version, self.accumulator_hash)
    }
}

/// The total order over ledger positions used everywhere in sync.
///
/// Only the state version takes part; honest nodes never disagree on the
/// hash at a given version, and a peer that does is caught by verification.
pub fn compare_accumulators(a: &AccumulatorState, b: &AccumulatorState) -> Ordering {
    a.state_version.cmp(&b.state_version)
}

/// Append one transaction ID to the accumulator
pub fn accumulate(parent: &AccumulatorState, txn_id: &Hash) -> AccumulatorState {
    AccumulatorState {
        state_version: parent.state_version + 1,
        accumulator_hash: Hash::combine(&parent.accumulator_hash, txn_id),
    }
}

/// Replay `txn_ids` from `start` and check the result is exactly `end`
pub fn verify_accumulator(start: &AccumulatorState, txn_ids: &[Hash], end: &AccumulatorState) -> bool {
    let replayed = txn_ids
        .iter()
        .fold(*start, |acc, id| accumulate(&acc, id));
    replayed == *end
}
