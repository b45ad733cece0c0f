use std::collections::HashSet;

use super::types::Track;

/// Keep the first track for every normalized key, preserving order.
pub fn dedupe(tracks: &[Track]) -> Vec<Track> {
    let mut seen = HashSet::with_capacity(tracks.len());
    tracks
        .iter()
        .filter(|track| seen.insert(track.key()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::types::Service;

    fn track(title: &str, artist: &str, id: &str) -> Track {
        Track {
            title: title.into(),
            artist: artist.into(),
            duration_ms: 180_000,
            service_id: id.into(),
            service: Service::Spotify,
        }
    }

    #[test]
    fn test_keeps_first_occurrence_in_order() {
        let tracks = vec![
            track("Song A", "Artist", "1"),
            track("Song B", "Artist", "2"),
            track("Song A (Remastered)", "Artist", "3"),
            track("song b", "ARTIST", "4"),
            track("Song C", "Artist", "5"),
        ];

        let deduped = dedupe(&tracks);
        let ids: Vec<_> = deduped.iter().map(|t| t.service_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "5"]);
    }

    #[test]
    fn test_same_key_different_duration_is_duplicate() {
        let mut longer = track("Song", "Artist", "2");
        longer.duration_ms = 240_000;
        let tracks = vec![track("Song", "Artist", "1"), longer];

        assert_eq!(dedupe(&tracks).len(), 1);
    }

    #[test]
    fn test_is_idempotent() {
        let tracks = vec![
            track("One", "X", "1"),
            track("One - Live", "X", "2"),
            track("Two", "Y", "3"),
            track("Two", "Y feat. Z", "4"),
            track("", "", "5"),
            track("[Intro]", "", "6"),
        ];

        let once = dedupe(&tracks);
        let twice = dedupe(&once);
        assert_eq!(once, twice);
        assert_eq!(once.len(), 4);
    }

    #[test]
    fn test_empty_input() {
        assert!(dedupe(&[]).is_empty());
    }
}
