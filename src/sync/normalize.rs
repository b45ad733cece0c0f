//! Canonical comparison keys for tracks.
//!
//! Services decorate the same song differently ("Song (Remastered 2011)",
//! "Song - Radio Edit", "Artist feat. Guest"). Both sides are reduced to a
//! lowercase `(title, artist)` pair before any set comparison.

use std::sync::LazyLock;

use regex::Regex;

static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid parenthetical pattern"));

static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]*\]").expect("valid bracket pattern"));

/// A hyphen only starts a suffix with whitespace on both sides, so "Jay-Z"
/// survives. En and em dashes are never part of a name.
static DASH_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\s+-\s+|\s*[\u{2013}\u{2014}]\s*).*$").expect("valid dash suffix pattern")
});

static NOISE_TOKENS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:featuring|feat|ft|remix|remastered|remaster)\b\.?")
        .expect("valid noise token pattern")
});

/// `(normalized title, normalized artist)`; equal keys mean the same song.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedKey {
    pub title: String,
    pub artist: String,
}

impl NormalizedKey {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.artist.is_empty()
    }
}

/// Strip decorations but keep the original casing. Used for search queries.
pub fn clean(text: &str) -> String {
    let text = PARENTHETICAL.replace_all(text, "");
    let text = BRACKETED.replace_all(&text, "");
    let text = DASH_SUFFIX.replace(&text, "");
    let text = NOISE_TOKENS.replace_all(&text, "");

    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_text(text: &str) -> String {
    clean(text).to_lowercase()
}

pub fn normalize(title: &str, artist: &str) -> NormalizedKey {
    NormalizedKey {
        title: normalize_text(title),
        artist: normalize_text(artist),
    }
}

/// Query sent to a catalog search: "artist title", both cleaned.
pub fn search_query(title: &str, artist: &str) -> String {
    let artist = clean(artist);
    let title = clean(title);
    match (artist.is_empty(), title.is_empty()) {
        (true, _) => title,
        (_, true) => artist,
        _ => format!("{} {}", artist, title),
    }
}
