// Identity Tests
// Keypairs, detached signatures and node ids

mod node_id_test;
