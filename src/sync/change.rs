use super::types::PlaylistPair;

/// Decide whether a pair needs a full sync.
///
/// Compares live track counts against the last snapshot. An equal-count swap
/// (one track added, another removed) goes unnoticed until `force` is used.
pub fn should_sync(pair: &PlaylistPair, live_count_a: usize, live_count_b: usize, force: bool) -> bool {
    if force {
        return true;
    }

    match &pair.snapshot {
        None => true,
        Some(snapshot) => snapshot.count_a != live_count_a || snapshot.count_b != live_count_b,
    }
}
