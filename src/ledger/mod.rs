// Ledger module - WHAT IS COMMITTED
// Accumulator positions, signed headers and transaction batches

mod accumulator;
mod hash;
mod proof;
mod txn;

pub use accumulator::{accumulate, compare_accumulators, verify_accumulator, AccumulatorState};
pub use hash::Hash;
pub use proof::{
    LedgerError, LedgerHeader, LedgerProof, LedgerProofDescriptor, LedgerUpdate, Validator,
    ValidatorSet,
};
pub use txn::{Txn, TxnsAndProof};
