use std::collections::HashSet;

use super::normalize::NormalizedKey;
use super::types::Track;

/// Same-key absence between two deduplicated track lists.
#[derive(Debug, Clone, Default)]
pub struct PlaylistDiff {
    /// Tracks on A whose key is absent from B.
    pub missing_on_b: Vec<Track>,
    /// Tracks on B whose key is absent from A.
    pub missing_on_a: Vec<Track>,
    /// Number of keys present on both sides.
    pub shared: usize,
}

pub fn diff(deduped_a: &[Track], deduped_b: &[Track]) -> PlaylistDiff {
    let keys_a: HashSet<NormalizedKey> = deduped_a.iter().map(Track::key).collect();
    let keys_b: HashSet<NormalizedKey> = deduped_b.iter().map(Track::key).collect();

    let missing_on_b = deduped_a
        .iter()
        .filter(|track| !keys_b.contains(&track.key()))
        .cloned()
        .collect();
    let missing_on_a = deduped_b
        .iter()
        .filter(|track| !keys_a.contains(&track.key()))
        .cloned()
        .collect();

    PlaylistDiff {
        missing_on_b,
        missing_on_a,
        shared: keys_a.intersection(&keys_b).count(),
    }
}
