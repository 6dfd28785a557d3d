// LedgerStore - committed transactions and proofs on sled
//
// Layout (all versions big-endian so sled's key order is version order):
// - txn:{v}    the transaction that produced state version v
// - acc:{v}    the accumulator state at version v
// - proof:{v}  a signed proof ending at version v (only at batch boundaries)
// - meta:tail  the latest committed proof
//
// A batch is written with one sled::Batch, so a crash never leaves
// transactions without the proof that covers them.

use crate::ledger::{
    accumulate, AccumulatorState, LedgerProof, LedgerProofDescriptor, Txn, TxnsAndProof,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod keys {
    pub const TXN_PREFIX: &[u8] = b"txn:";
    pub const ACC_PREFIX: &[u8] = b"acc:";
    pub const PROOF_PREFIX: &[u8] = b"proof:";
    pub const TAIL: &[u8] = b"meta:tail";

    pub fn versioned(prefix: &[u8], version: u64) -> Vec<u8> {
        [prefix, &version.to_be_bytes()[..]].concat()
    }
}

/// Errors from storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    OpenFailed(String),

    #[error("Database operation failed: {0}")]
    DatabaseError(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    #[error("Flush failed: {0}")]
    FlushFailed(String),

    #[error("Missing ledger entry at version {0}")]
    MissingEntry(u64),

    #[error("Batch starts at version {got} but the ledger ends at {tail}")]
    NonContiguous { tail: u64, got: u64 },

    #[error("Accumulator mismatch at version {0}")]
    AccumulatorMismatch(u64),
}

impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::DatabaseError(err.to_string())
    }
}

/// Read access to committed transactions, as needed to serve sync requests
pub trait CommittedReader: Send + Sync {
    /// The transactions following `start`, ending at a stored proof.
    ///
    /// Returns None when there is nothing past `start` to serve.
    fn get_next_batch(
        &self,
        start: &LedgerProofDescriptor,
        max_txns: usize,
    ) -> Result<Option<TxnsAndProof>, StoreError>;
}

/// Persistent ledger of committed transactions
///
/// Uses sled for crash-safe, embedded storage.
pub struct LedgerStore {
    db: sled::Db,
}

impl LedgerStore {
    /// Open or create a store; an empty store is seeded with `genesis`
    pub fn open<P: AsRef<Path>>(path: P, genesis: &LedgerProof) -> Result<Self, StoreError> {
        let db = sled::open(path).map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Self::init(db, genesis)
    }

    /// Store that lives only as long as the process
    pub fn temporary(genesis: &LedgerProof) -> Result<Self, StoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| StoreError::OpenFailed(e.to_string()))?;
        Self::init(db, genesis)
    }

    fn init(db: sled::Db, genesis: &LedgerProof) -> Result<Self, StoreError> {
        let store = Self { db };

        if store.db.get(keys::TAIL)?.is_none() {
            let version = genesis.state_version();
            let mut batch = sled::Batch::default();
            batch.insert(
                keys::versioned(keys::ACC_PREFIX, version),
                encode(genesis.accumulator_state())?,
            );
            batch.insert(keys::versioned(keys::PROOF_PREFIX, version), encode(genesis)?);
            batch.insert(keys::TAIL, encode(genesis)?);
            store.db.apply_batch(batch)?;
        }

        Ok(store)
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::FlushFailed(e.to_string()))?;
        Ok(())
    }

    /// The latest committed proof
    pub fn tail(&self) -> Result<LedgerProof, StoreError> {
        let bytes = self.db.get(keys::TAIL)?.ok_or(StoreError::MissingEntry(0))?;
        decode(&bytes)
    }

    pub fn accumulator_at(&self, version: u64) -> Result<Option<AccumulatorState>, StoreError> {
        self.get(&keys::versioned(keys::ACC_PREFIX, version))
    }

    pub fn txn_at(&self, version: u64) -> Result<Option<Txn>, StoreError> {
        self.get(&keys::versioned(keys::TXN_PREFIX, version))
    }

    // ========================================================================
    // COMMIT
    // ========================================================================

    /// Append a verified batch.
    ///
    /// Transactions the ledger already holds are skipped, so a batch that
    /// overlaps the tail is fine. Returns the new tail, or None if the batch
    /// brought nothing new.
    pub fn commit(&self, batch: &TxnsAndProof) -> Result<Option<LedgerProof>, StoreError> {
        let tail = self.tail()?;
        let end = batch.end();
        if !end.is_ahead_of(&tail) {
            return Ok(None);
        }

        let start = &batch.start().accumulator_state;
        let start_version = start.state_version();
        if start_version > tail.state_version() {
            return Err(StoreError::NonContiguous {
                tail: tail.state_version(),
                got: start_version,
            });
        }
        if self.accumulator_at(start_version)?.as_ref() != Some(start) {
            return Err(StoreError::AccumulatorMismatch(start_version));
        }

        let already_committed = (tail.state_version() - start_version) as usize;
        if already_committed > batch.txns().len() {
            return Err(StoreError::AccumulatorMismatch(end.state_version()));
        }

        let mut writes = sled::Batch::default();
        let mut acc = *tail.accumulator_state();
        for txn in &batch.txns()[already_committed..] {
            acc = accumulate(&acc, &txn.id());
            let version = acc.state_version();
            writes.insert(keys::versioned(keys::TXN_PREFIX, version), encode(txn)?);
            writes.insert(keys::versioned(keys::ACC_PREFIX, version), encode(&acc)?);
        }
        if &acc != end.accumulator_state() {
            return Err(StoreError::AccumulatorMismatch(end.state_version()));
        }

        writes.insert(keys::versioned(keys::PROOF_PREFIX, end.state_version()), encode(end)?);
        writes.insert(keys::TAIL, encode(end)?);
        self.db.apply_batch(writes)?;

        debug!(
            from = tail.state_version(),
            to = end.state_version(),
            "Committed batch"
        );
        Ok(Some(end.clone()))
    }

    /// Append transactions produced locally, covered by `proof`
    pub fn commit_local(
        &self,
        txns: Vec<Txn>,
        proof: LedgerProof,
    ) -> Result<Option<LedgerProof>, StoreError> {
        let start = self.tail()?.descriptor();
        self.commit(&TxnsAndProof::new(txns, start, proof))
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, StoreError> {
        match self.db.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The furthest stored proof past `version` covering at most `max_txns`,
    /// or the nearest one if even that is larger
    fn end_proof_after(
        &self,
        version: u64,
        max_txns: usize,
    ) -> Result<Option<LedgerProof>, StoreError> {
        let from = keys::versioned(keys::PROOF_PREFIX, version.saturating_add(1));
        let to = keys::versioned(keys::PROOF_PREFIX, u64::MAX);

        let mut chosen: Option<LedgerProof> = None;
        for entry in self.db.range(from..=to) {
            let (_, bytes) = entry?;
            let proof: LedgerProof = decode(&bytes)?;
            let span = proof.state_version() - version;
            if chosen.is_some() && span > max_txns as u64 {
                break;
            }
            chosen = Some(proof);
        }
        Ok(chosen)
    }
}

impl CommittedReader for LedgerStore {
    fn get_next_batch(
        &self,
        start: &LedgerProofDescriptor,
        max_txns: usize,
    ) -> Result<Option<TxnsAndProof>, StoreError> {
        let version = start.accumulator_state.state_version();
        match self.accumulator_at(version)? {
            Some(acc) if acc == start.accumulator_state => {}
            Some(_) => return Err(StoreError::AccumulatorMismatch(version)),
            None => return Ok(None),
        }

        let Some(end) = self.end_proof_after(version, max_txns)? else {
            return Ok(None);
        };

        let mut txns = Vec::with_capacity((end.state_version() - version) as usize);
        for v in version + 1..=end.state_version() {
            txns.push(self.txn_at(v)?.ok_or(StoreError::MissingEntry(v))?);
        }

        Ok(Some(TxnsAndProof::new(txns, *start, end)))
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(|e| StoreError::SerializationFailed(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(|e| StoreError::DeserializationFailed(e.to_string()))
}
