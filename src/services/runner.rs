use crate::error::SyncError;
use crate::ports::store::{ErrorLogEntry, PairStore};
use crate::sync::executor::ExecutionReport;
use crate::sync::types::SyncStatus;
use crate::sync::{SyncEngine, SyncOptions};

/// What happened to one pair during a multi-pair run.
#[derive(Debug)]
pub struct PairSummary {
    pub pair_id: u32,
    pub name: String,
    pub result: Result<ExecutionReport, SyncError>,
}

impl PairSummary {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(report) if report.status != SyncStatus::Failed)
    }
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub pairs: Vec<PairSummary>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.pairs.iter().all(PairSummary::succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.pairs.iter().filter(|p| !p.succeeded()).count()
    }
}

/// Sync every stored pair (or only `only_pair`) one after another.
///
/// A failing pair is logged and recorded in the error log; later pairs still
/// run. Store failures while loading the pair list abort the run.
pub async fn run_all(
    engine: &SyncEngine,
    store: &dyn PairStore,
    options: &SyncOptions,
    only_pair: Option<u32>,
) -> Result<RunSummary, SyncError> {
    let mut pairs = store.load_pairs().await?;
    if let Some(id) = only_pair {
        pairs.retain(|pair| pair.id == id);
        if pairs.is_empty() {
            return Err(SyncError::Config(format!("Playlist pair {} not found", id)));
        }
    }

    if pairs.is_empty() {
        tracing::info!("No playlist pairs configured");
    }

    let mut summary = RunSummary::default();
    for pair in pairs {
        let name = format!("{} <-> {}", pair.playlist_a.name, pair.playlist_b.name);

        let result = match engine.run_sync(&pair, options).await {
            Ok(outcome) if options.dry_run => Ok(outcome.report),
            Ok(outcome) => match store.save_pair(&outcome.pair).await {
                Ok(()) => {
                    record_outcome(store, pair.id, &outcome.report).await;
                    Ok(outcome.report)
                }
                Err(error) => {
                    tracing::error!(pair = pair.id, %error, "Failed to save playlist pair");
                    log_error(store, pair.id, &error).await;
                    Err(error)
                }
            },
            Err(error) => {
                tracing::error!(pair = pair.id, %error, "Playlist pair sync failed");
                if !options.dry_run {
                    log_error(store, pair.id, &error).await;
                }
                Err(error)
            }
        };

        summary.pairs.push(PairSummary {
            pair_id: pair.id,
            name,
            result,
        });
    }

    Ok(summary)
}

async fn record_outcome(store: &dyn PairStore, pair_id: u32, report: &ExecutionReport) {
    if !report.unmatched.is_empty() {
        let tracks: Vec<_> = report
            .unmatched
            .iter()
            .map(|track| {
                let suggestion = report
                    .suggestions
                    .iter()
                    .find(|s| s.source == *track)
                    .map(|s| s.candidate.service_id.clone());
                serde_json::json!({
                    "title": track.title,
                    "artist": track.artist,
                    "service": track.service,
                    "suggestion": suggestion,
                })
            })
            .collect();
        let entry = ErrorLogEntry::new(
            "unmatched_tracks",
            format!("{} tracks could not be matched", report.unmatched.len()),
            serde_json::json!({ "pair": pair_id, "tracks": tracks }),
        );
        append(store, entry).await;
    }

    if report.status == SyncStatus::Failed {
        let entry = ErrorLogEntry::new(
            "pair_sync",
            format!("Sync of pair {} finished with errors", pair_id),
            serde_json::json!({ "pair": pair_id, "errors": report.errors }),
        );
        append(store, entry).await;
    }
}

async fn log_error(store: &dyn PairStore, pair_id: u32, error: &SyncError) {
    let entry = ErrorLogEntry::new(
        "pair_sync",
        error.to_string(),
        serde_json::json!({ "pair": pair_id, "auth": error.is_auth() }),
    );
    append(store, entry).await;
}

/// Error-log writes are best effort.
async fn append(store: &dyn PairStore, entry: ErrorLogEntry) {
    if let Err(error) = store.append_error_log(entry).await {
        tracing::warn!(%error, "Failed to append to error log");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ports::playlist::{MockPlaylistClient, PlaylistClient};
    use crate::ports::store::MockPairStore;
    use crate::sync::executor::SyncExecutor;
    use crate::sync::scheduler::{MatchScheduler, SchedulerConfig};
    use crate::sync::rate_limit::SlidingWindowLimiter;
    use crate::sync::types::{MatchCandidate, PlaylistPair, PlaylistRef, Service, Track};

    fn pair(id: u32, a: &str) -> PlaylistPair {
        PlaylistPair::new(
            id,
            PlaylistRef {
                id: a.into(),
                name: a.into(),
            },
            PlaylistRef {
                id: format!("yt-{}", a),
                name: a.into(),
            },
        )
    }

    /// Spotify side fails for playlist "broken", both sides are empty otherwise.
    fn engine() -> SyncEngine {
        let mut client_a = MockPlaylistClient::new();
        client_a.expect_service().return_const(Service::Spotify);
        client_a.expect_fetch_tracks().returning(|playlist| {
            if playlist == "broken" {
                Err(SyncError::Auth {
                    service: Service::Spotify,
                    reason: "token expired".into(),
                })
            } else {
                Ok(Vec::<Track>::new())
            }
        });
        let mut client_b = MockPlaylistClient::new();
        client_b.expect_service().return_const(Service::YoutubeMusic);
        client_b
            .expect_fetch_tracks()
            .returning(|_| Ok(Vec::<Track>::new()));

        let client_a: Arc<dyn PlaylistClient> = Arc::new(client_a);
        let client_b: Arc<dyn PlaylistClient> = Arc::new(client_b);
        SyncEngine::new(
            client_a,
            client_b,
            MatchScheduler::new(SchedulerConfig::default()),
            SyncExecutor::default(),
        )
    }

    #[tokio::test]
    async fn test_failing_pair_does_not_stop_the_run() {
        let mut store = MockPairStore::new();
        store
            .expect_load_pairs()
            .returning(|| Ok(vec![pair(1, "broken"), pair(2, "fine")]));
        store
            .expect_append_error_log()
            .withf(|entry| entry.kind == "pair_sync")
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_save_pair()
            .withf(|saved| saved.id == 2 && saved.last_sync_status == Some(SyncStatus::Success))
            .times(1)
            .returning(|_| Ok(()));

        let summary = run_all(&engine(), &store, &SyncOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(summary.pairs.len(), 2);
        assert!(matches!(summary.pairs[0].result, Err(SyncError::Auth { .. })));
        assert!(summary.pairs[1].succeeded());
        assert_eq!(summary.failed_count(), 1);
        assert!(!summary.all_succeeded());
    }

    #[tokio::test]
    async fn test_dry_run_saves_nothing() {
        let mut store = MockPairStore::new();
        store
            .expect_load_pairs()
            .returning(|| Ok(vec![pair(2, "fine")]));
        store.expect_save_pair().never();
        store.expect_append_error_log().never();

        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let summary = run_all(&engine(), &store, &options, None).await.unwrap();

        assert!(summary.all_succeeded());
        let report = summary.pairs[0].result.as_ref().unwrap();
        assert!(report.dry_run);
    }

    #[tokio::test]
    async fn test_unknown_pair_filter_is_a_config_error() {
        let mut store = MockPairStore::new();
        store
            .expect_load_pairs()
            .returning(|| Ok(vec![pair(1, "fine")]));

        let result = run_all(&engine(), &store, &SyncOptions::default(), Some(7)).await;

        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    /// Spotify holds "Found" and "Lost"; YouTube Music only knows "Found".
    fn lossy_engine(write_fails: bool) -> SyncEngine {
        let source = |title: &str| Track {
            title: title.into(),
            artist: "Band".into(),
            duration_ms: 200_000,
            service_id: format!("sp-{}", title),
            service: Service::Spotify,
        };
        let tracks = vec![source("Found"), source("Lost")];

        let mut client_a = MockPlaylistClient::new();
        client_a.expect_service().return_const(Service::Spotify);
        client_a
            .expect_fetch_tracks()
            .returning(move |_| Ok(tracks.clone()));

        let mut client_b = MockPlaylistClient::new();
        client_b.expect_service().return_const(Service::YoutubeMusic);
        client_b.expect_max_batch_size().return_const(50usize);
        client_b
            .expect_fetch_tracks()
            .returning(|_| Ok(Vec::<Track>::new()));
        client_b.expect_search_candidates().returning(|query| {
            if query.contains("Lost") {
                return Ok(vec![]);
            }
            Ok(vec![MatchCandidate {
                title: "Found".into(),
                artist: "Band".into(),
                duration_ms: 200_000,
                service_id: "yt-found".into(),
                service: Service::YoutubeMusic,
            }])
        });
        client_b
            .expect_current_track_ids()
            .returning(|_| Ok(Default::default()));
        client_b.expect_add_tracks().returning(move |playlist, _| {
            if write_fails {
                Err(SyncError::Write {
                    service: Service::YoutubeMusic,
                    playlist: playlist.to_string(),
                    written: 0,
                    reason: "quota exceeded".into(),
                })
            } else {
                Ok(())
            }
        });

        let client_a: Arc<dyn PlaylistClient> = Arc::new(client_a);
        let client_b: Arc<dyn PlaylistClient> = Arc::new(client_b);
        SyncEngine::new(
            client_a,
            client_b,
            MatchScheduler::new(SchedulerConfig::default())
                .with_limiter(Service::YoutubeMusic, SlidingWindowLimiter::per_second(100)),
            SyncExecutor::default(),
        )
    }

    fn is_unmatched_entry(entry: &ErrorLogEntry) -> bool {
        entry.kind == "unmatched_tracks"
            && entry.details["pair"] == 1
            && entry.details["tracks"].as_array().map(Vec::len) == Some(1)
            && entry.details["tracks"][0]["title"] == "Lost"
    }

    #[tokio::test]
    async fn test_unmatched_tracks_are_logged() {
        let mut store = MockPairStore::new();
        store
            .expect_load_pairs()
            .returning(|| Ok(vec![pair(1, "mix")]));
        store
            .expect_save_pair()
            .withf(|saved| saved.last_sync_status == Some(SyncStatus::Success))
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_append_error_log()
            .withf(is_unmatched_entry)
            .times(1)
            .returning(|_| Ok(()));

        let summary = run_all(&lossy_engine(false), &store, &SyncOptions::default(), None)
            .await
            .unwrap();

        assert!(summary.all_succeeded());
        let report = summary.pairs[0].result.as_ref().unwrap();
        assert_eq!(report.added_count_b, 1);
        assert_eq!(report.unmatched.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_logs_pair_sync_entry() {
        let mut store = MockPairStore::new();
        store
            .expect_load_pairs()
            .returning(|| Ok(vec![pair(1, "mix")]));
        store
            .expect_save_pair()
            .withf(|saved| saved.last_sync_status == Some(SyncStatus::Failed))
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_append_error_log()
            .withf(is_unmatched_entry)
            .times(1)
            .returning(|_| Ok(()));
        store
            .expect_append_error_log()
            .withf(|entry| {
                entry.kind == "pair_sync"
                    && entry.details["errors"]
                        .as_array()
                        .is_some_and(|errors| !errors.is_empty())
            })
            .times(1)
            .returning(|_| Ok(()));

        let summary = run_all(&lossy_engine(true), &store, &SyncOptions::default(), None)
            .await
            .unwrap();

        assert_eq!(summary.failed_count(), 1);
        let report = summary.pairs[0].result.as_ref().unwrap();
        assert_eq!(report.status, SyncStatus::Failed);
    }
}
