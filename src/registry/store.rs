//! Lobby registry interface and implementations
//!
//! The registry is the persisted record of lobbies owned by hosting
//! accounts. Reconciliation only reads `{min_stars}` per owned lobby; the
//! initializer writes full records.

use crate::error::{LobbyError, Result};
use crate::types::{LobbyRecord, OwnedLobby, RegistrySnapshot, RoomId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Trait for lobby registry operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyRegistry: Send + Sync {
    /// Lobbies currently owned by `creator`
    async fn owned_lobbies(&self, creator: &str) -> Result<RegistrySnapshot>;

    /// Store a lobby record, replacing any record with the same lobby id
    async fn insert(&self, record: LobbyRecord) -> Result<()>;

    /// Forget a lobby; returns whether it was known
    async fn remove(&self, lobby_id: RoomId) -> Result<bool>;

    /// Every stored record
    async fn all(&self) -> Result<Vec<LobbyRecord>>;
}

fn snapshot_for(records: &[LobbyRecord], creator: &str) -> RegistrySnapshot {
    records
        .iter()
        .filter(|record| record.creator == creator)
        .map(|record| OwnedLobby {
            min_stars: record.min_stars,
        })
        .collect()
}

fn upsert(records: &mut Vec<LobbyRecord>, record: LobbyRecord) {
    match records.iter_mut().find(|r| r.lobby_id == record.lobby_id) {
        Some(existing) => *existing = record,
        None => records.push(record),
    }
}

/// In-memory lobby registry
#[derive(Debug, Default)]
pub struct InMemoryLobbyRegistry {
    records: RwLock<Vec<LobbyRecord>>,
}

impl InMemoryLobbyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<LobbyRecord>) -> Self {
        Self {
            records: RwLock::new(records),
        }
    }

    fn read_lock(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<LobbyRecord>>> {
        self.records.read().map_err(|_| {
            LobbyError::RegistryUnavailable {
                reason: "Failed to acquire registry read lock".to_string(),
            }
            .into()
        })
    }

    fn write_lock(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<LobbyRecord>>> {
        self.records.write().map_err(|_| {
            LobbyError::RegistryUnavailable {
                reason: "Failed to acquire registry write lock".to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl LobbyRegistry for InMemoryLobbyRegistry {
    async fn owned_lobbies(&self, creator: &str) -> Result<RegistrySnapshot> {
        let records = self.read_lock()?;
        Ok(snapshot_for(&records, creator))
    }

    async fn insert(&self, record: LobbyRecord) -> Result<()> {
        let mut records = self.write_lock()?;
        upsert(&mut records, record);
        Ok(())
    }

    async fn remove(&self, lobby_id: RoomId) -> Result<bool> {
        let mut records = self.write_lock()?;
        let before = records.len();
        records.retain(|r| r.lobby_id != lobby_id);
        Ok(records.len() != before)
    }

    async fn all(&self) -> Result<Vec<LobbyRecord>> {
        Ok(self.read_lock()?.clone())
    }
}

/// Lobby registry persisted as a JSON array on disk
///
/// Writes go to a temp file that is renamed over the original, so a crash
/// mid-write leaves the previous contents intact. A missing file reads as an
/// empty registry.
#[derive(Debug)]
pub struct JsonFileLobbyRegistry {
    path: PathBuf,
    /// Serializes read-modify-write cycles
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonFileLobbyRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<LobbyRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(LobbyError::RegistryUnavailable {
                    reason: format!("Cannot read {}: {}", self.path.display(), e),
                }
                .into())
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            LobbyError::RegistryUnavailable {
                reason: format!("Cannot parse {}: {}", self.path.display(), e),
            }
            .into()
        })
    }

    async fn save(&self, records: &[LobbyRecord]) -> Result<()> {
        let unavailable = |what: &str, e: &dyn std::fmt::Display| LobbyError::RegistryUnavailable {
            reason: format!("Cannot {} {}: {}", what, self.path.display(), e),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable("create directory for", &e))?;
        }

        let content =
            serde_json::to_string_pretty(records).map_err(|e| unavailable("serialize", &e))?;

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| unavailable("write temp file for", &e))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| unavailable("replace", &e))?;

        debug!("Saved {} lobby records to {}", records.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl LobbyRegistry for JsonFileLobbyRegistry {
    async fn owned_lobbies(&self, creator: &str) -> Result<RegistrySnapshot> {
        Ok(snapshot_for(&self.load().await?, creator))
    }

    async fn insert(&self, record: LobbyRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        upsert(&mut records, record);
        self.save(&records).await
    }

    async fn remove(&self, lobby_id: RoomId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let before = records.len();
        records.retain(|r| r.lobby_id != lobby_id);
        if records.len() == before {
            return Ok(false);
        }
        self.save(&records).await?;
        Ok(true)
    }

    async fn all(&self) -> Result<Vec<LobbyRecord>> {
        self.load().await
    }
}
