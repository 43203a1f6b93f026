//! Chat session owning the connection and its lobby subscriptions

use crate::chat::transport::ChatTransport;
use crate::error::{LobbyError, Result};
use crate::types::{InboundMessage, LobbyRef, RoomId};
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Explicit session object passed to everything that talks to chat
pub struct ChatSession {
    transport: Arc<dyn ChatTransport>,
    /// Lobby channels joined through this session
    joined_lobbies: RwLock<BTreeSet<String>>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            joined_lobbies: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn nickname(&self) -> &str {
        self.transport.nickname()
    }

    /// Send a single line to a user or channel
    pub async fn send(&self, target: &str, text: &str) -> Result<()> {
        debug!("-> {}: {}", target, text);
        self.transport.send_privmsg(target, text).await
    }

    /// Join the channel of a multiplayer room
    pub async fn join_lobby(&self, room_id: RoomId) -> Result<LobbyRef> {
        let lobby = LobbyRef::new(room_id);
        self.transport.join(&lobby.channel_name).await?;

        self.joined_lobbies
            .write()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire joined lobbies lock".to_string(),
            })?
            .insert(lobby.channel_name.clone());

        info!("Joined lobby channel {}", lobby.channel_name);
        Ok(lobby)
    }

    /// Channels joined so far, sorted
    pub fn joined_lobbies(&self) -> Vec<String> {
        self.joined_lobbies
            .read()
            .map(|joined| joined.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.transport.subscribe()
    }
}
