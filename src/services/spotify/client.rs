use std::collections::HashSet;
use std::sync::Arc;

use url::Url;

use super::types::{
    AddTracksRequest, PlaylistTracksPage, SearchResponse, SpotifyTrack, track_uri,
};
use crate::error::SyncError;
use crate::ports::auth::TokenProvider;
use crate::ports::playlist::PlaylistClient;
use crate::services::http::{self, Operation};
use crate::sync::types::{MatchCandidate, Service, Track};

const API_BASE: &str = "https://api.spotify.com/v1";
const SEARCH_LIMIT: &str = "10";
/// Hard limit of the add-items endpoint.
const MAX_URIS_PER_REQUEST: usize = 100;

/// Spotify Web API client
pub struct SpotifyClient {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    max_batch_size: usize,
}

impl SpotifyClient {
    pub fn new(tokens: Arc<dyn TokenProvider>, max_batch_size: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens,
            max_batch_size: max_batch_size.clamp(1, MAX_URIS_PER_REQUEST),
        }
    }

    async fn token(&self) -> Result<String, SyncError> {
        self.tokens.valid_token(Service::Spotify).await
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, SyncError> {
        let mut url = Url::parse(&format!("{}/{}", API_BASE, path))
            .map_err(|e| SyncError::Config(format!("Invalid Spotify URL: {}", e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl PlaylistClient for SpotifyClient {
    fn service(&self) -> Service {
        Service::Spotify
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn fetch_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, SyncError> {
        let token = self.token().await?;
        let mut all_tracks = Vec::new();
        let mut next_url = Some(
            self.url(&format!("playlists/{}/tracks", playlist_id), &[("limit", "100")])?
                .to_string(),
        );

        while let Some(url) = next_url {
            let page: PlaylistTracksPage = http::send_json(
                self.client.get(&url).bearer_auth(&token),
                Service::Spotify,
                Operation::Fetch(playlist_id),
            )
            .await?;

            all_tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .filter_map(SpotifyTrack::into_track),
            );
            next_url = page.next;
        }

        tracing::debug!(playlist_id, count = all_tracks.len(), "Fetched Spotify playlist");
        Ok(all_tracks)
    }

    async fn search_candidates(&self, query: &str) -> Result<Vec<MatchCandidate>, SyncError> {
        let token = self.token().await?;
        let url = self.url(
            "search",
            &[("q", query), ("type", "track"), ("limit", SEARCH_LIMIT)],
        )?;

        let response: SearchResponse = http::send_json(
            self.client.get(url).bearer_auth(&token),
            Service::Spotify,
            Operation::Search,
        )
        .await?;

        Ok(response
            .tracks
            .items
            .into_iter()
            .flatten()
            .filter_map(SpotifyTrack::into_candidate)
            .collect())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), SyncError> {
        let token = self.token().await?;
        let url = self.url(&format!("playlists/{}/tracks", playlist_id), &[])?;
        let uris: Vec<String> = track_ids.iter().map(|id| track_uri(id)).collect();

        for (index, chunk) in uris.chunks(MAX_URIS_PER_REQUEST).enumerate() {
            http::send(
                self.client
                    .post(url.clone())
                    .bearer_auth(&token)
                    .json(&AddTracksRequest { uris: chunk }),
                Service::Spotify,
                Operation::Write(playlist_id),
            )
            .await
            .map_err(|error| error.after_writing(index * MAX_URIS_PER_REQUEST))?;
        }

        tracing::debug!(playlist_id, count = track_ids.len(), "Added tracks to Spotify playlist");
        Ok(())
    }

    async fn current_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>, SyncError> {
        Ok(self
            .fetch_tracks(playlist_id)
            .await?
            .into_iter()
            .map(|track| track.service_id)
            .collect())
    }
}
