//! Lobby initializer
//!
//! Called exactly once per successfully created lobby. A failure here means
//! the room exists and is joined but is not tracked, which nothing in this
//! crate repairs automatically.

use crate::error::{LobbyError, Result};
use crate::registry::LobbyRegistry;
use crate::types::{LobbyInitConfig, LobbyRecord, LobbyRef};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Configures and persists a freshly joined lobby
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LobbyInitializer: Send + Sync {
    async fn initialize(&self, lobby: &LobbyRef, config: LobbyInitConfig) -> Result<()>;
}

/// Initializer that records the lobby in the registry
pub struct RegistryLobbyInitializer {
    registry: Arc<dyn LobbyRegistry>,
}

impl RegistryLobbyInitializer {
    pub fn new(registry: Arc<dyn LobbyRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl LobbyInitializer for RegistryLobbyInitializer {
    async fn initialize(&self, lobby: &LobbyRef, config: LobbyInitConfig) -> Result<()> {
        let record = LobbyRecord::new(lobby, &config);

        self.registry.insert(record).await.map_err(|e| {
            LobbyError::InitializationFailure {
                lobby_id: lobby.room_id,
                reason: e.to_string(),
            }
        })?;

        info!(
            "Registered lobby {} for bracket {} (creator {})",
            lobby.channel_name, config.bracket, config.creator_id
        );
        Ok(())
    }
}
