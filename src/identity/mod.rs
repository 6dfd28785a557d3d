// Identity module - WHO SIGNS AND WHO WE TALK TO
// Ed25519 validator keys, header signatures and peer node IDs

mod keypair;
mod node_id;
mod signer;

pub use keypair::*;
pub use node_id::NodeId;
pub use signer::*;
