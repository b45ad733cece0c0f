use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use super::types::{
    PlannedAdd, PlaylistPair, PlaylistSnapshot, Suggestion, SyncPlan, SyncStatus, Track,
};
use crate::error::SyncError;
use crate::ports::playlist::PlaylistClient;

/// Structured result of one pair's sync, handed back to the CLI layer.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub skipped: bool,
    pub dry_run: bool,
    pub added_count_a: usize,
    pub added_count_b: usize,
    /// Matches dropped because the destination already held the id.
    pub skipped_existing: usize,
    pub planned_a: usize,
    pub planned_b: usize,
    pub preview_a: Vec<PlannedAdd>,
    pub preview_b: Vec<PlannedAdd>,
    pub unmatched: Vec<Track>,
    /// Candidates to review by hand for some of the unmatched tracks.
    pub suggestions: Vec<Suggestion>,
    pub errors: Vec<String>,
    pub status: SyncStatus,
}

impl ExecutionReport {
    /// Report for a pair whose counts have not moved since the last sync.
    pub fn skipped(dry_run: bool) -> Self {
        Self {
            skipped: true,
            dry_run,
            added_count_a: 0,
            added_count_b: 0,
            skipped_existing: 0,
            planned_a: 0,
            planned_b: 0,
            preview_a: Vec::new(),
            preview_b: Vec::new(),
            unmatched: Vec::new(),
            suggestions: Vec::new(),
            errors: Vec::new(),
            status: SyncStatus::Skipped,
        }
    }

    fn from_plan(plan: &SyncPlan, dry_run: bool, preview_size: usize) -> Self {
        Self {
            skipped: false,
            dry_run,
            added_count_a: 0,
            added_count_b: 0,
            skipped_existing: 0,
            planned_a: plan.add_to_a.len(),
            planned_b: plan.add_to_b.len(),
            preview_a: plan.add_to_a.iter().take(preview_size).cloned().collect(),
            preview_b: plan.add_to_b.iter().take(preview_size).cloned().collect(),
            unmatched: plan.unmatched.clone(),
            suggestions: plan.suggestions.clone(),
            errors: plan.search_errors.clone(),
            status: SyncStatus::Success,
        }
    }

    pub fn total_added(&self) -> usize {
        self.added_count_a + self.added_count_b
    }
}

#[derive(Debug, Default)]
struct WriteOutcome {
    added: usize,
    skipped_existing: usize,
    errors: Vec<String>,
}

impl WriteOutcome {
    fn failed(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Applies a [`SyncPlan`] to both playlists and records the new snapshot.
#[derive(Debug, Clone)]
pub struct SyncExecutor {
    preview_size: usize,
}

impl Default for SyncExecutor {
    fn default() -> Self {
        Self { preview_size: 5 }
    }
}

impl SyncExecutor {
    pub fn new(preview_size: usize) -> Self {
        Self { preview_size }
    }

    /// Execute `plan` for `pair`, returning the updated pair and a report.
    ///
    /// Auth failures abort and leave the pair untouched. Other write failures
    /// are recorded and mark the pair as failed.
    pub async fn execute(
        &self,
        pair: &PlaylistPair,
        plan: SyncPlan,
        dry_run: bool,
        client_a: &Arc<dyn PlaylistClient>,
        client_b: &Arc<dyn PlaylistClient>,
    ) -> Result<(PlaylistPair, ExecutionReport), SyncError> {
        let mut report = ExecutionReport::from_plan(&plan, dry_run, self.preview_size);

        for track in &report.unmatched {
            tracing::warn!(pair = pair.id, track = %track, service = %track.service, "No match found");
        }

        if dry_run {
            tracing::info!(
                pair = pair.id,
                to_a = report.planned_a,
                to_b = report.planned_b,
                unmatched = report.unmatched.len(),
                "Dry run, no changes written"
            );
            return Ok((pair.clone(), report));
        }

        let to_b = self
            .write_direction(client_b.as_ref(), &pair.playlist_b.id, &plan.add_to_b)
            .await?;
        let to_a = self
            .write_direction(client_a.as_ref(), &pair.playlist_a.id, &plan.add_to_a)
            .await?;

        report.added_count_b = to_b.added;
        report.added_count_a = to_a.added;
        report.skipped_existing = to_a.skipped_existing + to_b.skipped_existing;
        let write_failed = to_a.failed() || to_b.failed();
        report.errors.extend(to_b.errors);
        report.errors.extend(to_a.errors);

        let mut updated = pair.clone();
        let now = Utc::now();
        updated.last_sync_at = Some(now);

        if write_failed {
            report.status = SyncStatus::Failed;
            updated.last_sync_status = Some(SyncStatus::Failed);
            tracing::error!(pair = pair.id, errors = report.errors.len(), "Sync finished with write errors");
            return Ok((updated, report));
        }

        let counts = tokio::try_join!(
            client_a.fetch_tracks(&pair.playlist_a.id),
            client_b.fetch_tracks(&pair.playlist_b.id),
        );
        match counts {
            Ok((tracks_a, tracks_b)) => {
                let updated_at = match &pair.snapshot {
                    Some(previous) if previous.updated_at > now => previous.updated_at,
                    _ => now,
                };
                updated.snapshot = Some(PlaylistSnapshot {
                    count_a: tracks_a.len(),
                    count_b: tracks_b.len(),
                    updated_at,
                });
                updated.last_sync_status = Some(SyncStatus::Success);
                tracing::info!(
                    pair = pair.id,
                    added_a = report.added_count_a,
                    added_b = report.added_count_b,
                    count_a = tracks_a.len(),
                    count_b = tracks_b.len(),
                    "Sync complete"
                );
            }
            Err(error) if error.is_auth() => return Err(error),
            Err(error) => {
                tracing::error!(pair = pair.id, %error, "Could not read post-write counts");
                report.errors.push(error.to_string());
                report.status = SyncStatus::Failed;
                updated.last_sync_status = Some(SyncStatus::Failed);
            }
        }

        Ok((updated, report))
    }

    async fn write_direction(
        &self,
        client: &dyn PlaylistClient,
        playlist_id: &str,
        adds: &[PlannedAdd],
    ) -> Result<WriteOutcome, SyncError> {
        let mut outcome = WriteOutcome::default();
        if adds.is_empty() {
            return Ok(outcome);
        }

        let mut present: HashSet<String> = match client.current_track_ids(playlist_id).await {
            Ok(ids) => ids,
            Err(error) if error.is_auth() => return Err(error),
            Err(error) => {
                tracing::error!(service = %client.service(), playlist_id, %error, "Could not read destination playlist");
                outcome.errors.push(error.to_string());
                return Ok(outcome);
            }
        };

        let mut pending = Vec::with_capacity(adds.len());
        for add in adds {
            let id = add.target_id();
            if present.contains(id) {
                tracing::debug!(track = %add.source, id, "Already in destination playlist");
                outcome.skipped_existing += 1;
                continue;
            }
            present.insert(id.to_string());
            pending.push(id.to_string());
        }

        for chunk in pending.chunks(client.max_batch_size().max(1)) {
            match client.add_tracks(playlist_id, chunk).await {
                Ok(()) => {
                    tracing::debug!(service = %client.service(), count = chunk.len(), "Added batch");
                    outcome.added += chunk.len();
                }
                Err(error) if error.is_auth() => return Err(error),
                Err(error) => {
                    tracing::error!(service = %client.service(), playlist_id, %error, "Batch add failed");
                    outcome.added += error.written().min(chunk.len());
                    outcome.errors.push(error.to_string());
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ports::playlist::MockPlaylistClient;
    use crate::sync::types::{MatchCandidate, PlaylistRef, Service};

    /// In-memory playlist that remembers what was added to it.
    struct FakePlaylist {
        service: Service,
        batch_size: usize,
        ids: Mutex<Vec<String>>,
        add_calls: Mutex<Vec<usize>>,
    }

    impl FakePlaylist {
        fn new(service: Service, ids: &[&str]) -> Self {
            Self {
                service,
                batch_size: 100,
                ids: Mutex::new(ids.iter().map(|id| id.to_string()).collect()),
                add_calls: Mutex::new(Vec::new()),
            }
        }

        fn add_calls(&self) -> Vec<usize> {
            self.add_calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PlaylistClient for FakePlaylist {
        fn service(&self) -> Service {
            self.service
        }

        fn max_batch_size(&self) -> usize {
            self.batch_size
        }

        async fn fetch_tracks(&self, _playlist_id: &str) -> Result<Vec<Track>, SyncError> {
            Ok(self
                .ids
                .lock()
                .unwrap()
                .iter()
                .map(|id| Track {
                    title: id.clone(),
                    artist: "Band".into(),
                    duration_ms: 1000,
                    service_id: id.clone(),
                    service: self.service,
                })
                .collect())
        }

        async fn search_candidates(&self, _query: &str) -> Result<Vec<MatchCandidate>, SyncError> {
            Ok(Vec::new())
        }

        async fn add_tracks(&self, _playlist_id: &str, track_ids: &[String]) -> Result<(), SyncError> {
            self.add_calls.lock().unwrap().push(track_ids.len());
            self.ids.lock().unwrap().extend(track_ids.iter().cloned());
            Ok(())
        }

        async fn current_track_ids(&self, _playlist_id: &str) -> Result<HashSet<String>, SyncError> {
            Ok(self.ids.lock().unwrap().iter().cloned().collect())
        }
    }

    fn pair() -> PlaylistPair {
        PlaylistPair::new(
            7,
            PlaylistRef {
                id: "sp-list".into(),
                name: "Mix".into(),
            },
            PlaylistRef {
                id: "yt-list".into(),
                name: "Mix".into(),
            },
        )
    }

    fn planned(title: &str, source: Service, target_id: &str, target: Service) -> PlannedAdd {
        PlannedAdd {
            source: Track {
                title: title.into(),
                artist: "Band".into(),
                duration_ms: 1000,
                service_id: format!("src-{}", title),
                service: source,
            },
            matched: MatchCandidate {
                title: title.into(),
                artist: "Band".into(),
                duration_ms: 1000,
                service_id: target_id.into(),
                service: target,
            },
            score: 1.18,
        }
    }

    fn two_way_plan() -> SyncPlan {
        SyncPlan {
            add_to_a: vec![
                planned("c", Service::YoutubeMusic, "sp-c", Service::Spotify),
                planned("d", Service::YoutubeMusic, "sp-d", Service::Spotify),
            ],
            add_to_b: vec![
                planned("a", Service::Spotify, "yt-a", Service::YoutubeMusic),
                planned("b", Service::Spotify, "yt-b", Service::YoutubeMusic),
            ],
            unmatched: vec![Track {
                title: "lost".into(),
                artist: "Band".into(),
                duration_ms: 1000,
                service_id: "sp-lost".into(),
                service: Service::Spotify,
            }],
            ..SyncPlan::default()
        }
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let mut untouched_a = MockPlaylistClient::new();
        untouched_a.expect_add_tracks().never();
        untouched_a.expect_current_track_ids().never();
        untouched_a.expect_fetch_tracks().never();
        let mut untouched_b = MockPlaylistClient::new();
        untouched_b.expect_add_tracks().never();
        untouched_b.expect_current_track_ids().never();
        untouched_b.expect_fetch_tracks().never();
        let client_a: Arc<dyn PlaylistClient> = Arc::new(untouched_a);
        let client_b: Arc<dyn PlaylistClient> = Arc::new(untouched_b);

        let mut original = pair();
        original.snapshot = Some(PlaylistSnapshot {
            count_a: 3,
            count_b: 4,
            updated_at: Utc::now(),
        });

        let (updated, report) = SyncExecutor::new(1)
            .execute(&original, two_way_plan(), true, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(updated, original);
        assert!(report.dry_run);
        assert_eq!(report.added_count_a, 0);
        assert_eq!(report.added_count_b, 0);
        assert_eq!(report.planned_a, 2);
        assert_eq!(report.planned_b, 2);
        assert_eq!(report.preview_a.len(), 1);
        assert_eq!(report.preview_b[0].target_id(), "yt-a");
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.status, SyncStatus::Success);
    }

    #[tokio::test]
    async fn test_second_execution_writes_nothing() {
        let fake_a = Arc::new(FakePlaylist::new(Service::Spotify, &["sp-x"]));
        let fake_b = Arc::new(FakePlaylist::new(Service::YoutubeMusic, &["yt-x"]));
        let client_a: Arc<dyn PlaylistClient> = fake_a.clone();
        let client_b: Arc<dyn PlaylistClient> = fake_b.clone();
        let executor = SyncExecutor::default();

        let (after_first, first) = executor
            .execute(&pair(), two_way_plan(), false, &client_a, &client_b)
            .await
            .unwrap();
        assert_eq!(first.added_count_a, 2);
        assert_eq!(first.added_count_b, 2);
        assert_eq!(first.status, SyncStatus::Success);
        let snapshot = after_first.snapshot.clone().unwrap();
        assert_eq!((snapshot.count_a, snapshot.count_b), (3, 3));
        assert_eq!(after_first.last_sync_status, Some(SyncStatus::Success));

        let (after_second, second) = executor
            .execute(&after_first, two_way_plan(), false, &client_a, &client_b)
            .await
            .unwrap();
        assert_eq!(second.total_added(), 0);
        assert_eq!(second.skipped_existing, 4);
        assert_eq!(fake_a.add_calls(), vec![2]);
        assert_eq!(fake_b.add_calls(), vec![2]);
        let second_snapshot = after_second.snapshot.unwrap();
        assert_eq!((second_snapshot.count_a, second_snapshot.count_b), (3, 3));
        assert!(second_snapshot.updated_at >= snapshot.updated_at);
    }

    #[tokio::test]
    async fn test_adds_are_chunked_by_batch_size() {
        let mut fake_b = FakePlaylist::new(Service::YoutubeMusic, &[]);
        fake_b.batch_size = 2;
        let fake_b = Arc::new(fake_b);
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = fake_b.clone();

        let plan = SyncPlan {
            add_to_b: ["a", "b", "c", "d", "e"]
                .iter()
                .map(|t| planned(t, Service::Spotify, &format!("yt-{}", t), Service::YoutubeMusic))
                .collect(),
            ..SyncPlan::default()
        };

        let (_, report) = SyncExecutor::default()
            .execute(&pair(), plan, false, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(report.added_count_b, 5);
        assert_eq!(fake_b.add_calls(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_two_sources_matching_one_id_add_it_once() {
        let fake_b = Arc::new(FakePlaylist::new(Service::YoutubeMusic, &[]));
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = fake_b.clone();

        let plan = SyncPlan {
            add_to_b: vec![
                planned("song", Service::Spotify, "yt-same", Service::YoutubeMusic),
                planned("song live", Service::Spotify, "yt-same", Service::YoutubeMusic),
            ],
            ..SyncPlan::default()
        };

        let (_, report) = SyncExecutor::default()
            .execute(&pair(), plan, false, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(report.added_count_b, 1);
        assert_eq!(report.skipped_existing, 1);
    }

    #[tokio::test]
    async fn test_write_failure_marks_pair_failed_and_keeps_snapshot() {
        let mut failing_b = MockPlaylistClient::new();
        failing_b.expect_service().return_const(Service::YoutubeMusic);
        failing_b.expect_max_batch_size().return_const(50usize);
        failing_b
            .expect_current_track_ids()
            .returning(|_| Ok(HashSet::new()));
        failing_b.expect_add_tracks().returning(|playlist, _| {
            Err(SyncError::Write {
                service: Service::YoutubeMusic,
                playlist: playlist.to_string(),
                written: 0,
                reason: "quota exceeded".into(),
            })
        });
        failing_b.expect_fetch_tracks().never();
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = Arc::new(failing_b);

        let mut original = pair();
        let before = PlaylistSnapshot {
            count_a: 1,
            count_b: 1,
            updated_at: Utc::now(),
        };
        original.snapshot = Some(before.clone());

        let (updated, report) = SyncExecutor::default()
            .execute(&original, two_way_plan(), false, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(report.added_count_b, 0);
        assert_eq!(report.added_count_a, 2);
        assert!(report.errors.iter().any(|e| e.contains("quota exceeded")));
        assert_eq!(updated.last_sync_status, Some(SyncStatus::Failed));
        assert_eq!(updated.snapshot, Some(before));
    }

    #[tokio::test]
    async fn test_partial_batch_counts_what_was_written() {
        let mut one_at_a_time = MockPlaylistClient::new();
        one_at_a_time.expect_service().return_const(Service::YoutubeMusic);
        one_at_a_time.expect_max_batch_size().return_const(50usize);
        one_at_a_time
            .expect_current_track_ids()
            .returning(|_| Ok(HashSet::new()));
        one_at_a_time
            .expect_add_tracks()
            .times(1)
            .returning(|playlist, ids| {
                assert_eq!(ids.len(), 3);
                Err(SyncError::Write {
                    service: Service::YoutubeMusic,
                    playlist: playlist.to_string(),
                    written: 2,
                    reason: "quota exceeded".into(),
                })
            });
        one_at_a_time.expect_fetch_tracks().never();
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = Arc::new(one_at_a_time);

        let plan = SyncPlan {
            add_to_b: ["a", "b", "c"]
                .iter()
                .map(|t| planned(t, Service::Spotify, &format!("yt-{}", t), Service::YoutubeMusic))
                .collect(),
            ..SyncPlan::default()
        };

        let (updated, report) = SyncExecutor::default()
            .execute(&pair(), plan, false, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(report.added_count_b, 2);
        assert_eq!(report.status, SyncStatus::Failed);
        assert!(updated.snapshot.is_none());
    }

    #[tokio::test]
    async fn test_auth_failure_aborts_execution() {
        let mut expired = MockPlaylistClient::new();
        expired.expect_service().return_const(Service::YoutubeMusic);
        expired.expect_current_track_ids().returning(|_| {
            Err(SyncError::Auth {
                service: Service::YoutubeMusic,
                reason: "token expired".into(),
            })
        });
        expired.expect_add_tracks().never();
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = Arc::new(expired);

        let result = SyncExecutor::default()
            .execute(&pair(), two_way_plan(), false, &client_a, &client_b)
            .await;

        assert!(matches!(result, Err(SyncError::Auth { .. })));
    }

    #[tokio::test]
    async fn test_unmatched_tracks_do_not_fail_the_sync() {
        let client_a: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::Spotify, &[]));
        let client_b: Arc<dyn PlaylistClient> = Arc::new(FakePlaylist::new(Service::YoutubeMusic, &[]));
        let plan = SyncPlan {
            unmatched: two_way_plan().unmatched,
            search_errors: vec!["lost - Band: no results".into()],
            ..SyncPlan::default()
        };

        let (updated, report) = SyncExecutor::default()
            .execute(&pair(), plan, false, &client_a, &client_b)
            .await
            .unwrap();

        assert_eq!(report.status, SyncStatus::Success);
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(updated.snapshot.unwrap().count_a, 0);
    }
}
