//! Common types used throughout the lobby keeper

use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Numeric id of a multiplayer room
pub type RoomId = u64;

/// Two star ratings closer than this are the same bracket key
pub const STAR_KEY_EPSILON: f64 = 1e-6;

/// A skill-rating band and the lobby configuration that goes with it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bracket {
    pub min_stars: f64,
    pub max_stars: f64,
    #[serde(default)]
    pub allow_double_time: bool,
    #[serde(default)]
    pub score_v2: bool,
    pub title_template: String,
}

impl Bracket {
    /// Whether a registry key identifies this bracket
    pub fn has_key(&self, min_stars: f64) -> bool {
        (self.min_stars - min_stars).abs() < STAR_KEY_EPSILON
    }
}

impl std::fmt::Display for Bracket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}*", self.min_stars, self.max_stars)
    }
}

/// A room this account has created and joined
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LobbyRef {
    pub room_id: RoomId,
    pub channel_name: String,
}

impl LobbyRef {
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            channel_name: channel_for_room(room_id),
        }
    }
}

/// Chat channel name of a multiplayer room
pub fn channel_for_room(room_id: RoomId) -> String {
    format!("#mp_{}", room_id)
}

/// One entry of a registry snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OwnedLobby {
    pub min_stars: f64,
}

/// Lobbies owned by this account at a point in time
pub type RegistrySnapshot = Vec<OwnedLobby>;

/// A line received from the chat network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Nickname of the sender
    pub sender: String,
    /// Our own nickname for private messages, a `#channel` otherwise
    pub target: String,
    pub text: String,
}

impl InboundMessage {
    pub fn new(
        sender: impl Into<String>,
        target: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            target: target.into(),
            text: text.into(),
        }
    }

    pub fn is_private(&self) -> bool {
        !self.target.starts_with('#')
    }
}

/// Configuration handed to the lobby initializer with a fresh lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyInitConfig {
    pub creator_id: String,
    pub creator_discord_id: String,
    pub bracket: Bracket,
}

/// Persisted row describing an owned lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyRecord {
    pub lobby_id: RoomId,
    pub channel: String,
    pub creator: String,
    pub creator_discord_id: String,
    pub min_stars: f64,
    pub max_stars: f64,
    pub allow_double_time: bool,
    pub score_v2: bool,
    pub created_at: DateTime<Utc>,
}

impl LobbyRecord {
    pub fn new(lobby: &LobbyRef, config: &LobbyInitConfig) -> Self {
        Self {
            lobby_id: lobby.room_id,
            channel: lobby.channel_name.clone(),
            creator: config.creator_id.clone(),
            creator_discord_id: config.creator_discord_id.clone(),
            min_stars: config.bracket.min_stars,
            max_stars: config.bracket.max_stars,
            allow_double_time: config.bracket.allow_double_time,
            score_v2: config.bracket.score_v2,
            created_at: current_timestamp(),
        }
    }
}
