// ledger-sync - pull, verify and serve committed ledger transactions between nodes
//
// identity   who signs and who talks (keys, signatures, node ids)
// ledger     what is being synced (accumulator, proofs, transactions)
// storage    where committed transactions live (sled)
// sync       the local state machine, the remote responder and the wire messages
// transport  how messages move between nodes
// node       the tokio runtime tying it together

pub mod identity;
pub mod ledger;
pub mod node;
pub mod storage;
pub mod sync;
pub mod transport;
