use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use url::Url;

use super::types::{
    InsertPlaylistItem, PlaylistItem, PlaylistItemsResponse, SearchResponse, VideosResponse,
    artist_from_channel, parse_iso8601_duration, unescape_html,
};
use crate::error::SyncError;
use crate::ports::auth::TokenProvider;
use crate::ports::playlist::PlaylistClient;
use crate::services::http::{self, Operation};
use crate::sync::types::{MatchCandidate, Service, Track};

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: usize = 50;
const SEARCH_LIMIT: &str = "10";
/// YouTube's "Music" video category.
const MUSIC_CATEGORY_ID: &str = "10";

/// YouTube Data API v3 client for YouTube Music playlists.
pub struct YoutubeMusicClient {
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
    max_batch_size: usize,
}

impl YoutubeMusicClient {
    pub fn new(tokens: Arc<dyn TokenProvider>, max_batch_size: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            tokens,
            max_batch_size: max_batch_size.max(1),
        }
    }

    async fn token(&self) -> Result<String, SyncError> {
        self.tokens.valid_token(Service::YoutubeMusic).await
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, SyncError> {
        let mut url = Url::parse(&format!("{}/{}", API_BASE, path))
            .map_err(|e| SyncError::Config(format!("Invalid YouTube URL: {}", e)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn list_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>, SyncError> {
        let token = self.token().await?;
        let page_size = PAGE_SIZE.to_string();
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("part", "snippet"),
                ("playlistId", playlist_id),
                ("maxResults", page_size.as_str()),
            ];
            if let Some(page) = page_token.as_deref() {
                params.push(("pageToken", page));
            }
            let url = self.url("playlistItems", &params)?;

            let page: PlaylistItemsResponse = http::send_json(
                self.client.get(url).bearer_auth(&token),
                Service::YoutubeMusic,
                Operation::Fetch(playlist_id),
            )
            .await?;

            items.extend(page.items);
            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(items)
    }

    /// Look up durations for `video_ids`, `PAGE_SIZE` ids per request.
    async fn durations(
        &self,
        video_ids: &[String],
        operation: Operation<'_>,
    ) -> Result<HashMap<String, u64>, SyncError> {
        let token = self.token().await?;
        let mut durations = HashMap::with_capacity(video_ids.len());

        for chunk in video_ids.chunks(PAGE_SIZE) {
            let ids = chunk.join(",");
            let url = self.url("videos", &[("part", "contentDetails"), ("id", ids.as_str())])?;
            let response: VideosResponse = http::send_json(
                self.client.get(url).bearer_auth(&token),
                Service::YoutubeMusic,
                operation,
            )
            .await?;

            for video in response.items {
                match parse_iso8601_duration(&video.content_details.duration) {
                    Some(ms) => {
                        durations.insert(video.id, ms);
                    }
                    None => tracing::debug!(
                        video = %video.id,
                        duration = %video.content_details.duration,
                        "Unrecognised video duration"
                    ),
                }
            }
        }

        Ok(durations)
    }
}

#[async_trait::async_trait]
impl PlaylistClient for YoutubeMusicClient {
    fn service(&self) -> Service {
        Service::YoutubeMusic
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    async fn fetch_tracks(&self, playlist_id: &str) -> Result<Vec<Track>, SyncError> {
        let items = self.list_items(playlist_id).await?;

        let mut entries = Vec::with_capacity(items.len());
        for item in items {
            let snippet = item.snippet;
            match (snippet.resource_id.video_id, snippet.video_owner_channel_title) {
                (Some(video_id), Some(channel)) => {
                    entries.push((video_id, snippet.title, artist_from_channel(&channel)))
                }
                _ => tracing::debug!(playlist_id, title = %snippet.title, "Skipping unavailable video"),
            }
        }

        let ids: Vec<String> = entries.iter().map(|(id, _, _)| id.clone()).collect();
        let durations = self.durations(&ids, Operation::Fetch(playlist_id)).await?;

        let tracks: Vec<Track> = entries
            .into_iter()
            .map(|(video_id, title, artist)| Track {
                duration_ms: durations.get(&video_id).copied().unwrap_or_default(),
                service_id: video_id,
                title,
                artist,
                service: Service::YoutubeMusic,
            })
            .collect();

        tracing::debug!(playlist_id, count = tracks.len(), "Fetched YouTube playlist");
        Ok(tracks)
    }

    async fn search_candidates(&self, query: &str) -> Result<Vec<MatchCandidate>, SyncError> {
        let token = self.token().await?;
        let url = self.url(
            "search",
            &[
                ("part", "snippet"),
                ("type", "video"),
                ("videoCategoryId", MUSIC_CATEGORY_ID),
                ("maxResults", SEARCH_LIMIT),
                ("q", query),
            ],
        )?;

        let response: SearchResponse = http::send_json(
            self.client.get(url).bearer_auth(&token),
            Service::YoutubeMusic,
            Operation::Search,
        )
        .await?;

        let hits: Vec<(String, String, String)> = response
            .items
            .into_iter()
            .filter_map(|result| {
                let video_id = result.id.video_id?;
                Some((
                    video_id,
                    unescape_html(&result.snippet.title),
                    artist_from_channel(&unescape_html(&result.snippet.channel_title)),
                ))
            })
            .collect();
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = hits.iter().map(|(id, _, _)| id.clone()).collect();
        let durations = self.durations(&ids, Operation::Search).await?;

        Ok(hits
            .into_iter()
            .map(|(video_id, title, artist)| MatchCandidate {
                duration_ms: durations.get(&video_id).copied().unwrap_or_default(),
                service_id: video_id,
                title,
                artist,
                service: Service::YoutubeMusic,
            })
            .collect())
    }

    async fn add_tracks(&self, playlist_id: &str, track_ids: &[String]) -> Result<(), SyncError> {
        let token = self.token().await?;
        let url = self.url("playlistItems", &[("part", "snippet")])?;

        // The Data API has no batch insert.
        for (done, video_id) in track_ids.iter().enumerate() {
            http::send(
                self.client
                    .post(url.clone())
                    .bearer_auth(&token)
                    .json(&InsertPlaylistItem::video(playlist_id, video_id)),
                Service::YoutubeMusic,
                Operation::Write(playlist_id),
            )
            .await
            .map_err(|error| error.after_writing(done))?;
        }

        tracing::debug!(playlist_id, count = track_ids.len(), "Added videos to YouTube playlist");
        Ok(())
    }

    async fn current_track_ids(&self, playlist_id: &str) -> Result<HashSet<String>, SyncError> {
        Ok(self
            .list_items(playlist_id)
            .await?
            .into_iter()
            .filter_map(|item| item.snippet.resource_id.video_id)
            .collect())
    }
}
