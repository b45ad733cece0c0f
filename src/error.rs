use crate::sync::types::Service;

/// Failure taxonomy for a sync run.
///
/// Per-track failures (`Search`) are recovered locally by the matcher.
/// `Write` marks a pair as failed without aborting the run. `Auth`, `Fetch`
/// and `Store` are structural and stop the pair they occur in.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SyncError {
    #[error("{service} authentication failed: {reason}")]
    Auth { service: Service, reason: String },
    #[error("{service} search failed: {reason}")]
    Search { service: Service, reason: String },
    #[error("Failed to fetch {service} playlist {playlist}: {reason}")]
    Fetch {
        service: Service,
        playlist: String,
        reason: String,
    },
    #[error("Failed to write to {service} playlist {playlist}: {reason}")]
    Write {
        service: Service,
        playlist: String,
        /// Items that did reach the playlist before the failing request.
        written: usize,
        reason: String,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Store error: {0}")]
    Store(String),
}

impl SyncError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Auth { .. })
    }

    /// Items written before a partial write failed; 0 for every other error.
    pub fn written(&self) -> usize {
        match self {
            SyncError::Write { written, .. } => *written,
            _ => 0,
        }
    }

    /// Record that `count` items were written before this write failed.
    pub fn after_writing(self, count: usize) -> Self {
        match self {
            SyncError::Write {
                service,
                playlist,
                written,
                reason,
            } => SyncError::Write {
                service,
                playlist,
                written: written + count,
                reason,
            },
            other => other,
        }
    }
}
