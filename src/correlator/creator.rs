//! Command correlator: lobby creation as a single awaitable call
//!
//! The chat protocol is fire-and-forget. `create` sends `!mp make <title>`
//! to the bot and waits for the bot's room-created broadcast carrying the
//! same title. Every inbound message is checked against the pending table;
//! only sender and title decide a match, never arrival order.

use crate::chat::confirmation::{make_command, ConfirmationParser};
use crate::chat::dispatch::InboundHandler;
use crate::chat::session::ChatSession;
use crate::correlator::pending::PendingTable;
use crate::error::LobbyError;
use crate::types::{InboundMessage, LobbyRef};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default bot identity that creates rooms
pub const DEFAULT_BOT_USERNAME: &str = "BanchoBot";

/// Default bound on waiting for a confirmation
pub const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Creates a lobby with a given title and joins it
#[async_trait]
pub trait LobbyCreator: Send + Sync {
    async fn create(&self, title: &str) -> Result<LobbyRef, LobbyError>;

    /// Number of creations currently awaiting confirmation
    fn pending_count(&self) -> usize;
}

/// Settings for the command correlator
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub bot_username: String,
    pub match_url_prefix: String,
    pub create_timeout: Duration,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            match_url_prefix: crate::chat::DEFAULT_MATCH_URL_PREFIX.to_string(),
            create_timeout: DEFAULT_CREATE_TIMEOUT,
        }
    }
}

pub struct CommandCorrelator {
    session: Arc<ChatSession>,
    bot_username: String,
    parser: ConfirmationParser,
    create_timeout: Duration,
    pending: PendingTable,
}

impl CommandCorrelator {
    pub fn new(session: Arc<ChatSession>, config: CorrelatorConfig) -> Self {
        Self {
            session,
            parser: ConfirmationParser::new(&config.match_url_prefix),
            bot_username: config.bot_username,
            create_timeout: config.create_timeout,
            pending: PendingTable::new(),
        }
    }

    pub fn bot_username(&self) -> &str {
        &self.bot_username
    }

    /// Check one inbound message against every pending creation
    ///
    /// Returns true when the message settled a creation.
    pub fn observe(&self, message: &InboundMessage) -> bool {
        if message.sender != self.bot_username {
            return false;
        }

        let Some(confirmation) = self.parser.parse(&message.text) else {
            return false;
        };

        match self.pending.resolve(&confirmation.title, confirmation.room_id) {
            Ok(true) => true,
            Ok(false) => {
                debug!(
                    "Confirmation for room {} ('{}') matches no pending creation",
                    confirmation.room_id, confirmation.title
                );
                false
            }
            Err(e) => {
                warn!("Dropping confirmation for '{}': {}", confirmation.title, e);
                false
            }
        }
    }
}

#[async_trait]
impl LobbyCreator for CommandCorrelator {
    async fn create(&self, title: &str) -> Result<LobbyRef, LobbyError> {
        // The bound runs from registration and is never re-armed
        let deadline = Instant::now() + self.create_timeout;
        let mut registration = self.pending.register(title)?;

        if let Err(e) = self
            .session
            .send(&self.bot_username, &make_command(title))
            .await
        {
            self.pending.cancel(title, registration.id)?;
            return Err(LobbyError::ChatTransport {
                message: e.to_string(),
            });
        }

        let room_id = match tokio::time::timeout_at(deadline, &mut registration.receiver).await {
            Ok(Ok(room_id)) => room_id,
            Ok(Err(_)) => {
                return Err(LobbyError::InternalError {
                    message: format!("Pending creation for '{}' vanished", title),
                })
            }
            Err(_) => {
                if self.pending.cancel(title, registration.id)? {
                    return Err(LobbyError::Timeout {
                        title: title.to_string(),
                    });
                }
                // A confirmation settled the entry right at the deadline
                registration
                    .receiver
                    .try_recv()
                    .map_err(|_| LobbyError::InternalError {
                        message: format!("Pending creation for '{}' vanished", title),
                    })?
            }
        };

        info!("Room {} created for '{}', joining", room_id, title);

        self.session
            .join_lobby(room_id)
            .await
            .map_err(|e| LobbyError::JoinFailure {
                channel: crate::types::channel_for_room(room_id),
                reason: e.to_string(),
            })
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl InboundHandler for CommandCorrelator {
    fn name(&self) -> &'static str {
        "command_correlator"
    }

    async fn handle(&self, message: &InboundMessage) {
        self.observe(message);
    }
}
