use std::sync::Arc;

use super::dedupe::dedupe;
use super::diff::diff;
use super::scheduler::MatchScheduler;
use super::types::{MatchResult, PlannedAdd, Suggestion, SyncPlan, Track};
use crate::error::SyncError;
use crate::ports::playlist::PlaylistClient;

/// Composes dedupe, diff and matching into a [`SyncPlan`]. Performs no writes.
pub struct SyncPlanner<'a> {
    scheduler: &'a MatchScheduler,
    verbose: bool,
}

impl<'a> SyncPlanner<'a> {
    pub fn new(scheduler: &'a MatchScheduler) -> Self {
        Self {
            scheduler,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub async fn plan(
        &self,
        tracks_a: &[Track],
        tracks_b: &[Track],
        client_a: &Arc<dyn PlaylistClient>,
        client_b: &Arc<dyn PlaylistClient>,
    ) -> Result<SyncPlan, SyncError> {
        let deduped_a = dedupe(tracks_a);
        let deduped_b = dedupe(tracks_b);

        if deduped_a.len() != tracks_a.len() || deduped_b.len() != tracks_b.len() {
            tracing::info!(
                before_a = tracks_a.len(),
                after_a = deduped_a.len(),
                before_b = tracks_b.len(),
                after_b = deduped_b.len(),
                "Removed duplicate tracks before comparison"
            );
        }

        let playlist_diff = diff(&deduped_a, &deduped_b);
        tracing::info!(
            only_a = playlist_diff.missing_on_b.len(),
            only_b = playlist_diff.missing_on_a.len(),
            shared = playlist_diff.shared,
            "Compared playlists"
        );
        if self.verbose {
            for track in &playlist_diff.missing_on_b {
                tracing::info!(track = %track, "Missing on {}", client_b.service());
            }
            for track in &playlist_diff.missing_on_a {
                tracing::info!(track = %track, "Missing on {}", client_a.service());
            }
        }

        // The two passes target different services and limiters, so they overlap.
        let (to_b, to_a) = tokio::try_join!(
            self.scheduler
                .match_all(&playlist_diff.missing_on_b, client_b),
            self.scheduler
                .match_all(&playlist_diff.missing_on_a, client_a),
        )?;

        let mut plan = SyncPlan {
            deduped_count_a: deduped_a.len(),
            deduped_count_b: deduped_b.len(),
            shared_count: playlist_diff.shared,
            ..SyncPlan::default()
        };
        plan.add_to_b = self.partition(to_b, &mut plan);
        plan.add_to_a = self.partition(to_a, &mut plan);

        Ok(plan)
    }

    fn partition(&self, results: Vec<MatchResult>, plan: &mut SyncPlan) -> Vec<PlannedAdd> {
        let mut adds = Vec::new();
        for result in results {
            match result.candidate {
                Some(matched) => {
                    if self.verbose {
                        tracing::info!(
                            track = %result.source,
                            matched = %matched.service_id,
                            confidence = result.score.clamp(0.0, 1.0),
                            "Matched"
                        );
                    }
                    adds.push(PlannedAdd {
                        source: result.source,
                        matched,
                        score: result.score,
                    });
                }
                None => {
                    if let Some(error) = result.error {
                        plan.search_errors.push(format!("{}: {}", result.source, error));
                    }
                    if let Some((candidate, confidence)) = result.suggestion {
                        plan.suggestions.push(Suggestion {
                            source: result.source.clone(),
                            candidate,
                            confidence,
                        });
                    }
                    plan.unmatched.push(result.source);
                }
            }
        }
        adds
    }
}
