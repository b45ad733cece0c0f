//! Similarity scoring between a source track and catalog candidates.

use super::normalize::normalize;
use super::types::{MatchCandidate, Track};

/// Minimum combined score for a candidate to be accepted.
pub const ACCEPT_THRESHOLD: f64 = 0.8;

/// Minimum title/artist confidence for an unmatched track to get a suggestion.
pub const SUGGEST_THRESHOLD: f64 = 0.5;

const TITLE_WEIGHT: f64 = 0.7;
const ARTIST_WEIGHT: f64 = 0.3;
const EXACT_MATCH_BONUS: f64 = 0.1;
const DURATION_WEIGHT: f64 = 0.1;
const DURATION_TOLERANCE_MS: u64 = 5000;

/// Score of a track against itself: identical strings and durations.
pub const MAX_SCORE: f64 = (TITLE_WEIGHT + ARTIST_WEIGHT + 2.0 * EXACT_MATCH_BONUS)
    * (1.0 - DURATION_WEIGHT)
    + DURATION_WEIGHT;

// =============================================================================
// String similarity
// =============================================================================

/// Longest common contiguous block as `(start_a, start_b, len)`.
///
/// Ties resolve to the block that ends first in `a`, then first in `b`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for i in 0..a.len() {
        for j in 0..b.len() {
            if a[i] == b[j] {
                let len = previous[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                current[j + 1] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}

/// Characters covered by recursively matched blocks (Ratcliff/Obershelp).
fn matching_characters(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (i, j, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }

    len + matching_characters(&a[..i], &b[..j])
        + matching_characters(&a[i + len..], &b[j + len..])
}

/// `2 * matches / (len(a) + len(b))`; 0.0 when either side is empty.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let matches = matching_characters(&a, &b);

    2.0 * matches as f64 / (a.len() + b.len()) as f64
}

// =============================================================================
// Track scoring
// =============================================================================

/// Combined similarity of `candidate` to `source`.
///
/// Not clamped: exact-match bonuses can push the result above 1.0.
pub fn score(source: &Track, candidate: &MatchCandidate) -> f64 {
    let source_key = normalize(&source.title, &source.artist);
    let candidate_key = normalize(&candidate.title, &candidate.artist);

    let title_score = similarity_ratio(&source_key.title, &candidate_key.title);
    let artist_score = similarity_ratio(&source_key.artist, &candidate_key.artist);

    let mut combined = TITLE_WEIGHT * title_score + ARTIST_WEIGHT * artist_score;

    if source_key.title == candidate_key.title {
        combined += EXACT_MATCH_BONUS;
    }
    if source_key.artist == candidate_key.artist {
        combined += EXACT_MATCH_BONUS;
    }

    // Durations further apart than the tolerance neither blend in nor reject.
    let duration_diff = source.duration_ms.abs_diff(candidate.duration_ms);
    if duration_diff <= DURATION_TOLERANCE_MS {
        let duration_score = 1.0 - duration_diff as f64 / DURATION_TOLERANCE_MS as f64;
        combined = (1.0 - DURATION_WEIGHT) * combined + DURATION_WEIGHT * duration_score;
    }

    combined
}

pub fn is_accepted(score: f64) -> bool {
    score >= ACCEPT_THRESHOLD
}

/// Best candidate as `(index, score)`, plus the best score seen overall.
///
/// Only candidates clearing [`ACCEPT_THRESHOLD`] are returned; on equal scores
/// the earlier search rank wins.
pub fn best_candidate(source: &Track, candidates: &[MatchCandidate]) -> (Option<(usize, f64)>, f64) {
    let mut best: Option<(usize, f64)> = None;
    let mut best_seen = 0.0_f64;

    for (index, candidate) in candidates.iter().enumerate() {
        let candidate_score = score(source, candidate);
        best_seen = best_seen.max(candidate_score);

        if !is_accepted(candidate_score) {
            continue;
        }
        match best {
            Some((_, current)) if candidate_score <= current => {}
            _ => best = Some((index, candidate_score)),
        }
    }

    (best, best_seen)
}

/// Weighted title/artist similarity, without bonuses or the duration blend.
pub fn suggestion_confidence(source: &Track, candidate: &MatchCandidate) -> f64 {
    let source_key = normalize(&source.title, &source.artist);
    let candidate_key = normalize(&candidate.title, &candidate.artist);

    TITLE_WEIGHT * similarity_ratio(&source_key.title, &candidate_key.title)
        + ARTIST_WEIGHT * similarity_ratio(&source_key.artist, &candidate_key.artist)
}

/// Closest candidate worth showing for manual review, as `(index, confidence)`.
///
/// Used once nothing cleared [`ACCEPT_THRESHOLD`]. Candidates below
/// [`SUGGEST_THRESHOLD`] are never suggested.
pub fn suggest_candidate(source: &Track, candidates: &[MatchCandidate]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let confidence = suggestion_confidence(source, candidate);
        if best.is_none_or(|(_, current)| confidence > current) {
            best = Some((index, confidence));
        }
    }
    best.filter(|(_, confidence)| *confidence >= SUGGEST_THRESHOLD)
}
