// Storage module - PERSISTENCE
// Committed ledger storage using sled

mod store;

pub use store::{CommittedReader, LedgerStore, StoreError};
