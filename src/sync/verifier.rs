// Response Verification - nothing a peer sends is committed unchecked
//
// A sync response passes only if all three checks pass:
// 1. the end proof is signed by a quorum of the validator set we know
// 2. every signature on the end proof is valid
// 3. replaying the accumulator over the batch lands exactly on the end proof

use crate::identity::Signer;
use crate::ledger::{verify_accumulator, LedgerProof, ValidatorSet};
use crate::sync::messages::SyncResponse;
use tracing::warn;

/// All-or-nothing gate applied to every non-empty sync response
pub trait ResponseVerifier: Send + Sync {
    fn verify(&self, response: &SyncResponse) -> bool;
}

impl<F> ResponseVerifier for F
where
    F: Fn(&SyncResponse) -> bool + Send + Sync,
{
    fn verify(&self, response: &SyncResponse) -> bool {
        self(response)
    }
}

/// Checks the end proof's signers are the legitimate validator set with quorum
#[derive(Clone, Debug)]
pub struct ValidatorSetVerifier {
    validator_set: ValidatorSet,
}

impl ValidatorSetVerifier {
    pub fn new(validator_set: ValidatorSet) -> Self {
        Self { validator_set }
    }

    pub fn verify(&self, proof: &LedgerProof) -> bool {
        let mut power: u64 = 0;
        for signer in proof.signatures().keys() {
            match self.validator_set.get(signer) {
                Some(validator) => power = power.saturating_add(validator.power()),
                None => return false,
            }
        }
        self.validator_set.is_quorum(power)
    }
}

/// Checks every signature on the end proof against the signer's key
#[derive(Clone, Debug)]
pub struct SignaturesVerifier {
    validator_set: ValidatorSet,
}

impl SignaturesVerifier {
    pub fn new(validator_set: ValidatorSet) -> Self {
        Self { validator_set }
    }

    pub fn verify(&self, proof: &LedgerProof) -> bool {
        if proof.signatures().is_empty() {
            return false;
        }
        let digest = proof.header().signing_hash();
        proof.signatures().iter().all(|(signer, signature)| {
            self.validator_set
                .get(signer)
                .is_some_and(|v| Signer::verify(v.public_key(), digest.as_bytes(), signature))
        })
    }
}

/// Checks the batch continues the accumulator from its start to its end
#[derive(Clone, Copy, Debug, Default)]
pub struct AccumulatorVerifier;

impl AccumulatorVerifier {
    pub fn verify(&self, response: &SyncResponse) -> bool {
        let batch = response.batch();
        let start = &batch.start().accumulator_state;
        let end = batch.end().accumulator_state();
        end.is_ahead_of(start) && verify_accumulator(start, &batch.txn_ids(), end)
    }
}

/// The three checks composed in order
#[derive(Clone, Debug)]
pub struct SyncResponseVerifier {
    validator_set: ValidatorSetVerifier,
    signatures: SignaturesVerifier,
    accumulator: AccumulatorVerifier,
}

impl SyncResponseVerifier {
    pub fn new(validator_set: ValidatorSet) -> Self {
        Self {
            validator_set: ValidatorSetVerifier::new(validator_set.clone()),
            signatures: SignaturesVerifier::new(validator_set),
            accumulator: AccumulatorVerifier,
        }
    }
}

impl ResponseVerifier for SyncResponseVerifier {
    fn verify(&self, response: &SyncResponse) -> bool {
        let end = response.batch().end();

        if !self.validator_set.verify(end) {
            warn!(version = end.state_version(), "Invalid validator set");
            return false;
        }

        if !self.signatures.verify(end) {
            warn!(version = end.state_version(), "Invalid signatures");
            return false;
        }

        if !self.accumulator.verify(response) {
            warn!(version = end.state_version(), "Invalid accumulator");
            return false;
        }

        true
    }
}
