use std::collections::HashSet;

use crate::error::SyncError;
use crate::sync::types::{MatchCandidate, Service, Track};

/// Port trait wrapping the playlist API capabilities the sync engine uses.
///
/// Implementations live in `services::spotify` and `services::youtube`
/// (production) or test mocks.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PlaylistClient: Send + Sync {
    /// The service this client talks to.
    fn service(&self) -> Service;

    /// Largest number of ids accepted by a single `add_tracks` call.
    fn max_batch_size(&self) -> usize;

    async fn fetch_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, SyncError>;

    async fn search_candidates(&self, query: &str) -> Result<Vec<MatchCandidate>, SyncError>;

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), SyncError>;

    async fn current_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>, SyncError>;
}
