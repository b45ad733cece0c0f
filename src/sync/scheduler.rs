use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use super::normalize::search_query;
use super::rate_limit::SlidingWindowLimiter;
use super::score::{best_candidate, suggest_candidate};
use super::types::{MatchResult, Service, Track};
use crate::error::SyncError;
use crate::ports::playlist::PlaylistClient;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Concurrent search workers for large batches.
    pub workers: usize,
    /// Batches of this size or smaller are matched sequentially.
    pub sequential_threshold: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            sequential_threshold: 5,
        }
    }
}

/// Runs catalog searches for missing tracks against the opposite service.
///
/// Each target service has one limiter shared by all workers, so the budget
/// bounds aggregate throughput rather than per-worker throughput.
pub struct MatchScheduler {
    config: SchedulerConfig,
    limiters: HashMap<Service, Arc<SlidingWindowLimiter>>,
}

impl MatchScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        let limiters = [Service::Spotify, Service::YoutubeMusic]
            .into_iter()
            .map(|service| {
                (
                    service,
                    Arc::new(SlidingWindowLimiter::per_second(
                        service.default_requests_per_second(),
                    )),
                )
            })
            .collect();

        Self { config, limiters }
    }

    /// Replace the limiter used for searches against `service`.
    pub fn with_limiter(mut self, service: Service, limiter: SlidingWindowLimiter) -> Self {
        self.limiters.insert(service, Arc::new(limiter));
        self
    }

    fn limiter_for(&self, service: Service) -> Arc<SlidingWindowLimiter> {
        self.limiters
            .get(&service)
            .cloned()
            .unwrap_or_else(|| {
                Arc::new(SlidingWindowLimiter::per_second(
                    service.default_requests_per_second(),
                ))
            })
    }

    /// Match every track against `target`'s catalog.
    ///
    /// Returns exactly one result per input track, in input order. Search
    /// failures stay per-track, except auth failures which stop the whole
    /// batch.
    pub async fn match_all(
        &self,
        tracks: &[Track],
        target: &Arc<dyn PlaylistClient>,
    ) -> Result<Vec<MatchResult>, SyncError> {
        if tracks.is_empty() {
            return Ok(Vec::new());
        }

        let limiter = self.limiter_for(target.service());

        if tracks.len() <= self.config.sequential_threshold || self.config.workers <= 1 {
            tracing::debug!(
                count = tracks.len(),
                service = %target.service(),
                "Matching tracks sequentially"
            );
            let mut results = Vec::with_capacity(tracks.len());
            for track in tracks {
                results.push(match_one(track, target.as_ref(), &limiter).await?);
            }
            return Ok(results);
        }

        let workers = self.config.workers.min(tracks.len());
        tracing::debug!(
            count = tracks.len(),
            workers,
            service = %target.service(),
            "Matching tracks with worker pool"
        );

        let queue: Arc<Mutex<VecDeque<(usize, Track)>>> =
            Arc::new(Mutex::new(tracks.iter().cloned().enumerate().collect()));

        let handles = (0..workers).map(|_| {
            let queue = queue.clone();
            let target = target.clone();
            let limiter = limiter.clone();
            tokio::spawn(async move {
                let mut finished = Vec::new();
                loop {
                    let next = queue.lock().await.pop_front();
                    let Some((index, track)) = next else {
                        break;
                    };
                    match match_one(&track, target.as_ref(), &limiter).await {
                        Ok(result) => finished.push((index, result)),
                        Err(error) => {
                            // Drain the queue so the other workers stop too.
                            queue.lock().await.clear();
                            return Err(error);
                        }
                    }
                }
                Ok(finished)
            })
        });

        let mut slots: Vec<Option<MatchResult>> = vec![None; tracks.len()];
        let mut aborted = None;
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(finished)) => {
                    for (index, result) in finished {
                        slots[index] = Some(result);
                    }
                }
                Ok(Err(error)) => {
                    aborted.get_or_insert(error);
                }
                Err(error) => tracing::error!(%error, "Match worker terminated unexpectedly"),
            }
        }
        if let Some(error) = aborted {
            return Err(error);
        }

        Ok(slots
            .into_iter()
            .zip(tracks)
            .map(|(slot, track)| {
                slot.unwrap_or_else(|| {
                    MatchResult::failed(track.clone(), "match worker terminated unexpectedly")
                })
            })
            .collect())
    }
}

async fn match_one(
    track: &Track,
    target: &dyn PlaylistClient,
    limiter: &SlidingWindowLimiter,
) -> Result<MatchResult, SyncError> {
    let query = search_query(&track.title, &track.artist);

    limiter.acquire().await;
    let candidates = match target.search_candidates(&query).await {
        Ok(candidates) => candidates,
        Err(error) if error.is_auth() => {
            tracing::error!(track = %track, %error, "Search rejected credentials");
            return Err(error);
        }
        Err(error) => {
            tracing::warn!(track = %track, %error, "Search failed");
            return Ok(MatchResult::failed(track.clone(), error.to_string()));
        }
    };

    if candidates.is_empty() {
        tracing::debug!(track = %track, query = %query, "Search returned no results");
        return Ok(MatchResult::failed(
            track.clone(),
            format!("{} search returned no results for '{}'", target.service(), query),
        ));
    }

    let result = match best_candidate(track, &candidates) {
        (Some((index, score)), _) => {
            let candidate = candidates[index].clone();
            tracing::debug!(track = %track, matched = %candidate.service_id, score, "Found match");
            MatchResult::matched(track.clone(), candidate, score)
        }
        (None, best_seen) => {
            tracing::debug!(track = %track, best_seen, "No candidate cleared the threshold");
            let suggestion = suggest_candidate(track, &candidates)
                .map(|(index, confidence)| (candidates[index].clone(), confidence));
            MatchResult::unmatched(track.clone(), best_seen).with_suggestion(suggestion)
        }
    };
    Ok(result)
}
