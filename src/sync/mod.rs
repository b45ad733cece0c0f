//! Two-way playlist reconciliation between Spotify and YouTube Music.
//!
//! [`SyncEngine::run_sync`] is the single entry point: it reads both
//! playlists, checks the snapshot, plans the additions and applies them.

pub mod change;
pub mod dedupe;
pub mod diff;
pub mod executor;
pub mod normalize;
pub mod planner;
pub mod rate_limit;
pub mod scheduler;
pub mod score;
pub mod types;

use std::sync::Arc;

use crate::error::SyncError;
use crate::ports::playlist::PlaylistClient;
use change::should_sync;
use executor::{ExecutionReport, SyncExecutor};
use planner::SyncPlanner;
use scheduler::MatchScheduler;
use types::{PlaylistPair, SyncStatus};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub verbose: bool,
    pub force: bool,
    pub dry_run: bool,
}

/// The pair as it should be persisted, plus what happened to it.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub pair: PlaylistPair,
    pub report: ExecutionReport,
}

pub struct SyncEngine {
    client_a: Arc<dyn PlaylistClient>,
    client_b: Arc<dyn PlaylistClient>,
    scheduler: MatchScheduler,
    executor: SyncExecutor,
}

impl SyncEngine {
    pub fn new(
        client_a: Arc<dyn PlaylistClient>,
        client_b: Arc<dyn PlaylistClient>,
        scheduler: MatchScheduler,
        executor: SyncExecutor,
    ) -> Self {
        Self {
            client_a,
            client_b,
            scheduler,
            executor,
        }
    }

    /// Sync one pair. Errors are structural (auth anywhere, fetch); per-track
    /// and write failures are reported in the outcome instead.
    #[tracing::instrument(skip(self, pair), fields(pair = pair.id))]
    pub async fn run_sync(
        &self,
        pair: &PlaylistPair,
        options: &SyncOptions,
    ) -> Result<SyncOutcome, SyncError> {
        tracing::info!(
            a = %pair.playlist_a.name,
            b = %pair.playlist_b.name,
            dry_run = options.dry_run,
            "Syncing playlist pair"
        );

        let (tracks_a, tracks_b) = tokio::try_join!(
            self.client_a.fetch_tracks(&pair.playlist_a.id),
            self.client_b.fetch_tracks(&pair.playlist_b.id),
        )?;
        tracing::debug!(count_a = tracks_a.len(), count_b = tracks_b.len(), "Fetched playlists");

        if !should_sync(pair, tracks_a.len(), tracks_b.len(), options.force) {
            tracing::info!("Track counts unchanged since last sync, skipping");
            let mut updated = pair.clone();
            if !options.dry_run {
                updated.last_sync_status = Some(SyncStatus::Skipped);
            }
            return Ok(SyncOutcome {
                pair: updated,
                report: ExecutionReport::skipped(options.dry_run),
            });
        }

        let plan = SyncPlanner::new(&self.scheduler)
            .verbose(options.verbose)
            .plan(&tracks_a, &tracks_b, &self.client_a, &self.client_b)
            .await?;

        let (pair, report) = self
            .executor
            .execute(pair, plan, options.dry_run, &self.client_a, &self.client_b)
            .await?;

        Ok(SyncOutcome { pair, report })
    }
}
