// Sync Counters - what the sync services have been doing

/// Observability counters for the sync services
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncCounters {
    pub current_state_version: u64,
    pub target_state_version: u64,
    pub status_checks_started: u64,
    pub sync_requests_sent: u64,
    pub sync_request_timeouts: u64,
    pub empty_responses: u64,
    pub invalid_responses: u64,
    pub verified_responses: u64,
    pub ledger_update_timeouts: u64,
    pub remote_status_requests_served: u64,
    pub remote_sync_requests_served: u64,
    pub remote_sync_requests_dropped: u64,
    pub status_updates_sent: u64,
    pub status_updates_rate_limited: u64,
}
