use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::error::SyncError;
use crate::ports::store::{ErrorLogEntry, PairStore};
use crate::sync::types::{PlaylistPair, PlaylistRef};

const PAIRS_FILE: &str = "pairs.json";
const ERRORS_FILE: &str = "errors.json";

/// Only the most recent entries are kept in the error log.
pub const MAX_ERROR_ENTRIES: usize = 100;

/// File-backed [`PairStore`] holding `pairs.json` and `errors.json`.
pub struct JsonPairStore {
    directory: PathBuf,
    // Serializes read-modify-write cycles on the two files.
    lock: Mutex<()>,
}

impl JsonPairStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn pairs_path(&self) -> PathBuf {
        self.directory.join(PAIRS_FILE)
    }

    fn errors_path(&self) -> PathBuf {
        self.directory.join(ERRORS_FILE)
    }

    async fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, SyncError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(SyncError::Store(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| SyncError::Store(format!("Failed to parse {}: {}", path.display(), e)))
    }

    async fn write_list<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<(), SyncError> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                SyncError::Store(format!(
                    "Failed to create {}: {}",
                    self.directory.display(),
                    e
                ))
            })?;

        let json = serde_json::to_string_pretty(items)
            .map_err(|e| SyncError::Store(format!("Failed to serialize {}: {}", path.display(), e)))?;

        // Write then rename so a crash never leaves a truncated file behind.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| SyncError::Store(format!("Failed to replace {}: {}", path.display(), e)))
    }
}

#[async_trait::async_trait]
impl PairStore for JsonPairStore {
    async fn load_pairs(&self) -> Result<Vec<PlaylistPair>, SyncError> {
        let _guard = self.lock.lock().await;
        Self::read_list(&self.pairs_path()).await
    }

    async fn load_pair(&self, id: u32) -> Result<Option<PlaylistPair>, SyncError> {
        Ok(self.load_pairs().await?.into_iter().find(|pair| pair.id == id))
    }

    async fn save_pair(&self, pair: &PlaylistPair) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;
        let path = self.pairs_path();
        let mut pairs: Vec<PlaylistPair> = Self::read_list(&path).await?;

        let slot = pairs
            .iter_mut()
            .find(|existing| existing.id == pair.id)
            .ok_or_else(|| SyncError::Store(format!("Playlist pair {} not found", pair.id)))?;
        *slot = pair.clone();

        self.write_list(&path, &pairs).await?;
        tracing::debug!(pair = pair.id, "Saved playlist pair");
        Ok(())
    }

    async fn add_pair(
        &self,
        playlist_a: PlaylistRef,
        playlist_b: PlaylistRef,
    ) -> Result<PlaylistPair, SyncError> {
        let _guard = self.lock.lock().await;
        let path = self.pairs_path();
        let mut pairs: Vec<PlaylistPair> = Self::read_list(&path).await?;

        if let Some(existing) = pairs
            .iter()
            .find(|p| p.playlist_a.id == playlist_a.id && p.playlist_b.id == playlist_b.id)
        {
            return Err(SyncError::Config(format!(
                "Playlists are already paired as pair {}",
                existing.id
            )));
        }

        let id = pairs.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let pair = PlaylistPair::new(id, playlist_a, playlist_b);
        pairs.push(pair.clone());

        self.write_list(&path, &pairs).await?;
        tracing::info!(pair = id, "Added playlist pair");
        Ok(pair)
    }

    async fn remove_pair(&self, id: u32) -> Result<bool, SyncError> {
        let _guard = self.lock.lock().await;
        let path = self.pairs_path();
        let mut pairs: Vec<PlaylistPair> = Self::read_list(&path).await?;

        let before = pairs.len();
        pairs.retain(|pair| pair.id != id);
        if pairs.len() == before {
            return Ok(false);
        }

        self.write_list(&path, &pairs).await?;
        tracing::info!(pair = id, "Removed playlist pair");
        Ok(true)
    }

    async fn clear_snapshots(&self) -> Result<usize, SyncError> {
        let _guard = self.lock.lock().await;
        let path = self.pairs_path();
        let mut pairs: Vec<PlaylistPair> = Self::read_list(&path).await?;

        let cleared = pairs
            .iter_mut()
            .filter_map(|pair| pair.snapshot.take())
            .count();
        if cleared > 0 {
            self.write_list(&path, &pairs).await?;
        }
        tracing::info!(cleared, "Cleared playlist snapshots");
        Ok(cleared)
    }

    async fn reset_all(&self) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;
        self.write_list::<PlaylistPair>(&self.pairs_path(), &[]).await?;
        self.write_list::<ErrorLogEntry>(&self.errors_path(), &[]).await?;
        tracing::info!("Removed all playlist pairs and errors");
        Ok(())
    }

    async fn append_error_log(&self, entry: ErrorLogEntry) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;
        let path = self.errors_path();
        let mut entries: Vec<ErrorLogEntry> = Self::read_list(&path).await?;

        entries.push(entry);
        if entries.len() > MAX_ERROR_ENTRIES {
            let excess = entries.len() - MAX_ERROR_ENTRIES;
            entries.drain(..excess);
        }

        self.write_list(&path, &entries).await
    }

    async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorLogEntry>, SyncError> {
        let _guard = self.lock.lock().await;
        let entries: Vec<ErrorLogEntry> = Self::read_list(&self.errors_path()).await?;
        Ok(entries.into_iter().rev().take(limit).collect())
    }

    async fn clear_errors(&self) -> Result<(), SyncError> {
        let _guard = self.lock.lock().await;
        self.write_list::<ErrorLogEntry>(&self.errors_path(), &[]).await
    }
}
