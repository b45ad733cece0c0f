use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::normalize::{NormalizedKey, normalize};

/// Streaming service a track or playlist belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Spotify,
    YoutubeMusic,
}

impl Service {
    pub fn name(&self) -> &'static str {
        match self {
            Service::Spotify => "Spotify",
            Service::YoutubeMusic => "YouTube Music",
        }
    }

    /// Default aggregate search budget per second.
    pub fn default_requests_per_second(&self) -> usize {
        match self {
            Service::Spotify => 3,
            Service::YoutubeMusic => 2,
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A track as reported by one service's playlist listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    /// Service-local identifier; never comparable across services.
    pub service_id: String,
    pub service: Service,
}

impl Track {
    pub fn key(&self) -> NormalizedKey {
        normalize(&self.title, &self.artist)
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.title, self.artist)
    }
}

/// A catalog search hit on the opposite service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub title: String,
    pub artist: String,
    pub duration_ms: u64,
    /// Identifier used for the eventual add call.
    pub service_id: String,
    pub service: Service,
}

/// Outcome of matching one source track. Always one per input track.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub source: Track,
    pub candidate: Option<MatchCandidate>,
    /// Raw combined score of the best candidate seen, bonuses included.
    pub score: f64,
    pub error: Option<String>,
    /// Closest candidate below the acceptance threshold, with its confidence.
    pub suggestion: Option<(MatchCandidate, f64)>,
}

impl MatchResult {
    pub fn matched(source: Track, candidate: MatchCandidate, score: f64) -> Self {
        Self {
            source,
            candidate: Some(candidate),
            score,
            error: None,
            suggestion: None,
        }
    }

    pub fn unmatched(source: Track, best_score: f64) -> Self {
        Self {
            source,
            candidate: None,
            score: best_score,
            error: None,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: Option<(MatchCandidate, f64)>) -> Self {
        self.suggestion = suggestion;
        self
    }

    pub fn failed(source: Track, error: impl Into<String>) -> Self {
        Self {
            source,
            candidate: None,
            score: 0.0,
            error: Some(error.into()),
            suggestion: None,
        }
    }

    /// Score clamped to `[0, 1]` for display.
    pub fn confidence(&self) -> f64 {
        self.score.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: String,
    pub name: String,
}

/// Track counts recorded after the last successful sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSnapshot {
    pub count_a: usize,
    pub count_b: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    Failed,
    Skipped,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::Skipped => "skipped",
        })
    }
}

/// The unit of synchronization: side A is Spotify, side B is YouTube Music.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistPair {
    pub id: u32,
    pub playlist_a: PlaylistRef,
    pub playlist_b: PlaylistRef,
    #[serde(default, deserialize_with = "lenient_snapshot")]
    pub snapshot: Option<PlaylistSnapshot>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_sync_status: Option<SyncStatus>,
}

impl PlaylistPair {
    pub fn new(id: u32, playlist_a: PlaylistRef, playlist_b: PlaylistRef) -> Self {
        Self {
            id,
            playlist_a,
            playlist_b,
            snapshot: None,
            created_at: Some(Utc::now()),
            last_sync_at: None,
            last_sync_status: None,
        }
    }
}

/// A malformed snapshot is treated as absent so the next run does a full sync.
fn lenient_snapshot<'de, D>(deserializer: D) -> Result<Option<PlaylistSnapshot>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value::<PlaylistSnapshot>(value) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(error) => {
            tracing::warn!(%error, "Ignoring malformed playlist snapshot");
            Ok(None)
        }
    }
}

/// A matched track waiting to be written to the destination playlist.
#[derive(Debug, Clone)]
pub struct PlannedAdd {
    pub source: Track,
    pub matched: MatchCandidate,
    pub score: f64,
}

impl PlannedAdd {
    pub fn target_id(&self) -> &str {
        &self.matched.service_id
    }
}

/// A low-confidence candidate offered for manual review of an unmatched track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub source: Track,
    pub candidate: MatchCandidate,
    pub confidence: f64,
}

/// Additions and leftovers computed for a pair, not yet applied.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub add_to_a: Vec<PlannedAdd>,
    pub add_to_b: Vec<PlannedAdd>,
    pub unmatched: Vec<Track>,
    /// Per-track search failures, already counted in `unmatched`.
    pub search_errors: Vec<String>,
    /// Near misses for tracks in `unmatched`.
    pub suggestions: Vec<Suggestion>,
    pub deduped_count_a: usize,
    pub deduped_count_b: usize,
    /// Keys present on both sides after deduplication.
    pub shared_count: usize,
}

impl SyncPlan {
    pub fn total_additions(&self) -> usize {
        self.add_to_a.len() + self.add_to_b.len()
    }
}
