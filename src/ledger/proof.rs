// Ledger Proofs - signed headers that certify a ledger position
//
// A LedgerProof is a header (epoch, round, accumulator state) plus the
// validator signatures over its digest. Sync trusts nothing a peer says
// about the ledger unless it arrives wrapped in one of these.

use crate::identity::{Keypair, NodeId, PublicKey, Signature, Signer};
use crate::ledger::{compare_accumulators, AccumulatorState, Hash};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Ledger model errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validator set is empty")]
    EmptyValidatorSet,

    #[error("Validator set has zero total voting power")]
    ZeroVotingPower,

    #[error("Duplicate validator: {0}")]
    DuplicateValidator(NodeId),
}

/// A member of the validator set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    node_id: NodeId,
    public_key: PublicKey,
    power: u64,
}

impl Validator {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn power(&self) -> u64 {
        self.power
    }
}

/// The validators entitled to sign headers for an epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    validators: Vec<Validator>,
}

impl ValidatorSet {
    /// Build a set from (key, voting power) pairs
    pub fn new(members: Vec<(PublicKey, u64)>) -> Result<Self, LedgerError> {
        if members.is_empty() {
            return Err(LedgerError::EmptyValidatorSet);
        }

        let mut validators: Vec<Validator> = Vec::with_capacity(members.len());
        for (public_key, power) in members {
            let node_id = NodeId::from_public_key(&public_key);
            if validators.iter().any(|v| v.node_id == node_id) {
                return Err(LedgerError::DuplicateValidator(node_id));
            }
            validators.push(Validator {
                node_id,
                public_key,
                power,
            });
        }

        let set = Self { validators };
        if set.total_power() == 0 {
            return Err(LedgerError::ZeroVotingPower);
        }
        Ok(set)
    }

    /// Equal-power set over the given keypairs
    pub fn from_keypairs(keypairs: &[Keypair]) -> Result<Self, LedgerError> {
        Self::new(keypairs.iter().map(|kp| (kp.public_key(), 1)).collect())
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn get(&self, node_id: &NodeId) -> Option<&Validator> {
        self.validators.iter().find(|v| &v.node_id == node_id)
    }

    pub fn total_power(&self) -> u64 {
        self.validators.iter().map(|v| v.power).sum()
    }

    /// Strictly more than two thirds of the total voting power
    pub fn is_quorum(&self, power: u64) -> bool {
        (power as u128) * 3 > (self.total_power() as u128) * 2
    }
}

/// Header describing a ledger position at epoch/round granularity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    epoch: u64,
    round: u64,
    accumulator_state: AccumulatorState,
    timestamp_ms: u64,
    next_validator_set: Option<ValidatorSet>,
}

impl LedgerHeader {
    pub fn new(epoch: u64, round: u64, accumulator_state: AccumulatorState, timestamp_ms: u64) -> Self {
        Self {
            epoch,
            round,
            accumulator_state,
            timestamp_ms,
            next_validator_set: None,
        }
    }

    /// Mark this header as the last of its epoch
    pub fn with_next_validator_set(mut self, set: ValidatorSet) -> Self {
        self.next_validator_set = Some(set);
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn round(&self) -> u64 {
        self.round
    }

    pub fn accumulator_state(&self) -> &AccumulatorState {
        &self.accumulator_state
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn next_validator_set(&self) -> Option<&ValidatorSet> {
        self.next_validator_set.as_ref()
    }

    /// Digest that validators sign
    pub fn signing_hash(&self) -> Hash {
        let mut hasher = Sha256::new();
        hasher.update(b"ledger_header:");
        hasher.update(self.epoch.to_le_bytes());
        hasher.update(self.round.to_le_bytes());
        hasher.update(self.accumulator_state.state_version().to_le_bytes());
        hasher.update(self.accumulator_state.accumulator_hash().as_bytes());
        hasher.update(self.timestamp_ms.to_le_bytes());
        match &self.next_validator_set {
            Some(set) => {
                hasher.update([1u8]);
                for v in set.validators() {
                    hasher.update(v.public_key.as_bytes());
                    hasher.update(v.power.to_le_bytes());
                }
            }
            None => hasher.update([0u8]),
        }
        Hash::from_bytes(hasher.finalize().into())
    }
}

/// A header together with the validator signatures certifying it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerProof {
    header: LedgerHeader,
    signatures: BTreeMap<NodeId, Signature>,
}

impl LedgerProof {
    pub fn new(header: LedgerHeader, signatures: BTreeMap<NodeId, Signature>) -> Self {
        Self { header, signatures }
    }

    /// The unsigned proof every node starts from
    pub fn genesis() -> Self {
        Self::new(
            LedgerHeader::new(0, 0, AccumulatorState::genesis(), 0),
            BTreeMap::new(),
        )
    }

    /// Sign `header` with each of `signers`
    pub fn sign(header: LedgerHeader, signers: &[&Keypair]) -> Self {
        let digest = header.signing_hash();
        let signatures = signers
            .iter()
            .map(|kp| {
                (
                    NodeId::from_public_key(&kp.public_key()),
                    Signer::sign(kp, digest.as_bytes()),
                )
            })
            .collect();
        Self { header, signatures }
    }

    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    pub fn signatures(&self) -> &BTreeMap<NodeId, Signature> {
        &self.signatures
    }

    pub fn accumulator_state(&self) -> &AccumulatorState {
        self.header.accumulator_state()
    }

    pub fn state_version(&self) -> u64 {
        self.header.accumulator_state().state_version()
    }

    /// Position comparison under the accumulator order
    pub fn compare(&self, other: &LedgerProof) -> Ordering {
        compare_accumulators(self.accumulator_state(), other.accumulator_state())
    }

    pub fn is_ahead_of(&self, other: &LedgerProof) -> bool {
        self.compare(other) == Ordering::Greater
    }

    /// Unsigned wire form used as a sync cursor
    pub fn descriptor(&self) -> LedgerProofDescriptor {
        LedgerProofDescriptor {
            epoch: self.header.epoch,
            round: self.header.round,
            accumulator_state: self.header.accumulator_state,
        }
    }
}

/// Position a requester is syncing from; carries no signatures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerProofDescriptor {
    pub epoch: u64,
    pub round: u64,
    pub accumulator_state: AccumulatorState,
}

/// Notification that the local ledger has committed up to `tail`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerUpdate {
    tail: LedgerProof,
}

impl LedgerUpdate {
    pub fn new(tail: LedgerProof) -> Self {
        Self { tail }
    }

    pub fn tail(&self) -> &LedgerProof {
        &self.tail
    }
}
