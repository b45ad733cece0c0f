use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static ISO8601_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+(?:\.\d+)?)S)?)?$")
        .expect("valid duration pattern")
});

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemsResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub title: String,
    /// Absent for deleted and private videos.
    pub video_owner_channel_title: Option<String>,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub items: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: SearchResultId,
    pub snippet: SearchSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultId {
    pub video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSnippet {
    pub title: String,
    pub channel_title: String,
}

#[derive(Debug, Deserialize)]
pub struct VideosResponse {
    #[serde(default)]
    pub items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Deserialize)]
pub struct VideoContentDetails {
    pub duration: String,
}

/// Body for `playlistItems.insert`.
#[derive(Debug, Serialize)]
pub struct InsertPlaylistItem {
    pub snippet: InsertSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertSnippet {
    pub playlist_id: String,
    pub resource_id: ResourceId,
}

impl InsertPlaylistItem {
    pub fn video(playlist_id: &str, video_id: &str) -> Self {
        Self {
            snippet: InsertSnippet {
                playlist_id: playlist_id.to_string(),
                resource_id: ResourceId {
                    kind: "youtube#video".to_string(),
                    video_id: Some(video_id.to_string()),
                },
            },
        }
    }
}

/// Parse an ISO-8601 duration such as `PT3M33S` into milliseconds.
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let captures = ISO8601_DURATION.captures(value)?;
    let part = |index: usize| -> u64 {
        captures
            .get(index)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    let seconds: f64 = captures
        .get(4)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0);

    let whole = part(1) * 86_400 + part(2) * 3_600 + part(3) * 60;
    Some(whole * 1000 + (seconds * 1000.0).round() as u64)
}

/// Auto-generated artist channels are named "<Artist> - Topic".
pub fn artist_from_channel(channel_title: &str) -> String {
    let trimmed = channel_title.trim();
    trimmed
        .strip_suffix(" - Topic")
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Search snippets come back HTML-escaped.
pub fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
