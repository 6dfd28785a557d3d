// Sync Tests
// The local state machine, the remote responder, verification and the wire codec

mod remote_test;
