// Transactions - committed payloads and the batches that carry them
//
// A batch holds consecutive transactions plus the proofs bounding them.

use crate::ledger::{Hash, LedgerProof, LedgerProofDescriptor};
use serde::{Deserialize, Serialize};

/// An opaque committed transaction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Txn {
    payload: Vec<u8>,
}

impl Txn {
    pub fn new(payload: Vec<u8>) -> Self {
        Self { payload }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Transaction ID: the hash folded into the ledger accumulator
    pub fn id(&self) -> Hash {
        Hash::of(&self.payload)
    }
}

/// A contiguous run of committed transactions between two ledger positions
///
/// `start` is the position the batch continues from (the requester's cursor)
/// and `end` is the signed proof the last transaction lands on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnsAndProof {
    txns: Vec<Txn>,
    start: LedgerProofDescriptor,
    end: LedgerProof,
}

impl TxnsAndProof {
    pub fn new(txns: Vec<Txn>, start: LedgerProofDescriptor, end: LedgerProof) -> Self {
        Self { txns, start, end }
    }

    pub fn txns(&self) -> &[Txn] {
        &self.txns
    }

    pub fn start(&self) -> &LedgerProofDescriptor {
        &self.start
    }

    pub fn end(&self) -> &LedgerProof {
        &self.end
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// IDs in commit order, for accumulator replay
    pub fn txn_ids(&self) -> Vec<Hash> {
        self.txns.iter().map(Txn::id).collect()
    }
}
