use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::sync::types::{PlaylistPair, PlaylistRef};

/// One entry of the persistent error log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ErrorLogEntry {
    pub fn new(kind: impl Into<String>, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
            details,
        }
    }
}

/// Port trait for the configuration store that owns playlist pairs.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PairStore: Send + Sync {
    async fn load_pairs(&self) -> Result<Vec<PlaylistPair>, SyncError>;

    async fn load_pair(&self, id: u32) -> Result<Option<PlaylistPair>, SyncError>;

    /// Replace the stored pair with the same id.
    async fn save_pair(&self, pair: &PlaylistPair) -> Result<(), SyncError>;

    async fn add_pair(
        &self,
        playlist_a: PlaylistRef,
        playlist_b: PlaylistRef,
    ) -> Result<PlaylistPair, SyncError>;

    /// Returns whether a pair was removed.
    async fn remove_pair(&self, id: u32) -> Result<bool, SyncError>;

    /// Drop every pair's snapshot so the next run syncs them all. Returns how
    /// many snapshots were cleared.
    async fn clear_snapshots(&self) -> Result<usize, SyncError>;

    /// Remove all pairs and the error log.
    async fn reset_all(&self) -> Result<(), SyncError>;

    async fn append_error_log(&self, entry: ErrorLogEntry) -> Result<(), SyncError>;

    async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorLogEntry>, SyncError>;

    async fn clear_errors(&self) -> Result<(), SyncError>;
}
