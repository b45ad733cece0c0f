use serde::{Deserialize, Serialize};

use crate::sync::types::{MatchCandidate, Service, Track};

/// Spotify track from API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyTrack {
    /// Local files carry no id and cannot be synced.
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<SpotifyArtist>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

impl SpotifyTrack {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_track(self) -> Option<Track> {
        let artist = self.artist_names();
        Some(Track {
            service_id: self.id?,
            title: self.name,
            artist,
            duration_ms: self.duration_ms.unwrap_or_default(),
            service: Service::Spotify,
        })
    }

    pub fn into_candidate(self) -> Option<MatchCandidate> {
        let artist = self.artist_names();
        Some(MatchCandidate {
            service_id: self.id?,
            title: self.name,
            artist,
            duration_ms: self.duration_ms.unwrap_or_default(),
            service: Service::Spotify,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTrackObject {
    pub track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
pub struct PlaylistTracksPage {
    pub items: Vec<PlaylistTrackObject>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub tracks: SearchTracks,
}

#[derive(Debug, Deserialize)]
pub struct SearchTracks {
    #[serde(default)]
    pub items: Vec<Option<SpotifyTrack>>,
}

#[derive(Debug, Serialize)]
pub struct AddTracksRequest<'a> {
    pub uris: &'a [String],
}

pub fn track_uri(id: &str) -> String {
    format!("spotify:track:{}", id)
}
