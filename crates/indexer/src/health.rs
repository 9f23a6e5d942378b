use codesearch_protocol::IndexStatus;
use serde::Serialize;
use std::time::SystemTime;

/// Point-in-time view of a maintainer, published through a `watch` channel.
#[derive(Debug, Clone, Serialize)]
pub struct MaintainerHealth {
    pub status: IndexStatus,
    /// Changes applied since the last flush.
    pub pending_changes: u64,
    pub retry_queue_len: usize,
    pub dropped_changes: u64,
    pub last_flush: Option<SystemTime>,
    pub last_error: Option<String>,
    pub initial_files_indexed: usize,
}

impl MaintainerHealth {
    pub(crate) fn initial() -> Self {
        Self {
            status: IndexStatus::Idle,
            pending_changes: 0,
            retry_queue_len: 0,
            dropped_changes: 0,
            last_flush: None,
            last_error: None,
            initial_files_indexed: 0,
        }
    }
}
