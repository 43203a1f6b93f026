//! Table of in-flight lobby creations
//!
//! Each entry is an active predicate "confirmation for this title" plus the
//! one-shot slot its waiter listens on. Removing an entry is the only way to
//! settle it, and removal happens under the table lock, so an entry is
//! settled exactly once: by a confirmation or by its owner giving up.

use crate::error::LobbyError;
use crate::types::RoomId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;
use tokio::time::Instant;

struct PendingCreation {
    /// Distinguishes successive creations of the same title
    id: u64,
    created_at: Instant,
    resolve: oneshot::Sender<RoomId>,
}

/// Handle returned to the caller that registered a creation
pub struct Registration {
    pub id: u64,
    pub receiver: oneshot::Receiver<RoomId>,
}

#[derive(Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<String, PendingCreation>>,
    next_id: AtomicU64,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a creation for `title`; at most one per title
    pub fn register(&self, title: &str) -> Result<Registration, LobbyError> {
        let mut entries = self.lock()?;
        // An entry whose waiter was dropped can never settle; it is replaced
        if entries
            .get(title)
            .is_some_and(|pending| !pending.resolve.is_closed())
        {
            return Err(LobbyError::AlreadyPending {
                title: title.to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (resolve, receiver) = oneshot::channel();
        entries.insert(
            title.to_string(),
            PendingCreation {
                id,
                created_at: Instant::now(),
                resolve,
            },
        );

        Ok(Registration { id, receiver })
    }

    /// Settle the creation for `title` with a room id
    ///
    /// Returns false when nothing is waiting for that title.
    pub fn resolve(&self, title: &str, room_id: RoomId) -> Result<bool, LobbyError> {
        let mut entries = self.lock()?;
        match entries.remove(title) {
            Some(pending) => {
                tracing::debug!(
                    "Confirmation for '{}' after {:?}",
                    title,
                    pending.created_at.elapsed()
                );
                let _ = pending.resolve.send(room_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop the entry registered as `id`, if it is still unsettled
    ///
    /// Returns true when this call removed it.
    pub fn cancel(&self, title: &str, id: u64) -> Result<bool, LobbyError> {
        let mut entries = self.lock()?;
        if entries.get(title).is_some_and(|pending| pending.id == id) {
            entries.remove(title);
            return Ok(true);
        }
        Ok(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, title: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(title))
            .unwrap_or(false)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, PendingCreation>>, LobbyError> {
        self.entries.lock().map_err(|_| LobbyError::InternalError {
            message: "Failed to acquire pending creations lock".to_string(),
        })
    }
}
