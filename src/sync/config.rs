// Sync Configuration - timeouts, fanout and batch limits
//
// Durations are carried as milliseconds and exposed as Durations.

use crate::sync::SyncError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the local and remote sync services
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Period between status checks while idle (ms)
    pub sync_check_interval_ms: u64,
    /// How many peers to ask for their status per check
    pub sync_check_max_peers: usize,
    /// How long to wait for status responses (ms)
    pub sync_check_receive_status_timeout_ms: u64,
    /// How long to wait for a single sync response (ms)
    pub sync_request_timeout_ms: u64,
    /// How long to wait for a verified batch to show up as a ledger update (ms)
    pub sync_ledger_update_timeout_ms: u64,
    /// Fanout cap for ledger status update gossip
    pub ledger_status_update_max_peers_to_notify: usize,
    /// Ledger status updates sent per second
    pub max_ledger_updates_rate: u32,
    /// Upper bound on transactions served in one sync response
    pub max_txns_per_response: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sync_check_interval_ms: 5_000,
            sync_check_max_peers: 10,
            sync_check_receive_status_timeout_ms: 5_000,
            sync_request_timeout_ms: 5_000,
            sync_ledger_update_timeout_ms: 1_000,
            ledger_status_update_max_peers_to_notify: 10,
            max_ledger_updates_rate: 50,
            max_txns_per_response: 1_000,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sync_check_interval(mut self, ms: u64) -> Self {
        self.sync_check_interval_ms = ms;
        self
    }

    pub fn with_sync_check_max_peers(mut self, max: usize) -> Self {
        self.sync_check_max_peers = max;
        self
    }

    pub fn with_status_timeout(mut self, ms: u64) -> Self {
        self.sync_check_receive_status_timeout_ms = ms;
        self
    }

    pub fn with_request_timeout(mut self, ms: u64) -> Self {
        self.sync_request_timeout_ms = ms;
        self
    }

    pub fn with_ledger_update_timeout(mut self, ms: u64) -> Self {
        self.sync_ledger_update_timeout_ms = ms;
        self
    }

    pub fn with_max_peers_to_notify(mut self, max: usize) -> Self {
        self.ledger_status_update_max_peers_to_notify = max;
        self
    }

    pub fn with_max_ledger_updates_rate(mut self, per_sec: u32) -> Self {
        self.max_ledger_updates_rate = per_sec;
        self
    }

    pub fn with_max_txns_per_response(mut self, max: usize) -> Self {
        self.max_txns_per_response = max;
        self
    }

    pub fn sync_check_interval(&self) -> Duration {
        Duration::from_millis(self.sync_check_interval_ms)
    }

    pub fn sync_check_receive_status_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_check_receive_status_timeout_ms)
    }

    pub fn sync_request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_request_timeout_ms)
    }

    pub fn sync_ledger_update_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_ledger_update_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        let durations = [
            ("sync_check_interval_ms", self.sync_check_interval_ms),
            (
                "sync_check_receive_status_timeout_ms",
                self.sync_check_receive_status_timeout_ms,
            ),
            ("sync_request_timeout_ms", self.sync_request_timeout_ms),
            ("sync_ledger_update_timeout_ms", self.sync_ledger_update_timeout_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(SyncError::InvalidConfig(format!("{} cannot be 0", name)));
        }
        if self.sync_check_max_peers == 0 {
            return Err(SyncError::InvalidConfig("sync_check_max_peers cannot be 0".to_string()));
        }
        if self.ledger_status_update_max_peers_to_notify == 0 {
            return Err(SyncError::InvalidConfig(
                "ledger_status_update_max_peers_to_notify cannot be 0".to_string(),
            ));
        }
        if self.max_ledger_updates_rate == 0 {
            return Err(SyncError::InvalidConfig("max_ledger_updates_rate cannot be 0".to_string()));
        }
        if self.max_txns_per_response == 0 {
            return Err(SyncError::InvalidConfig("max_txns_per_response cannot be 0".to_string()));
        }
        Ok(())
    }
}
