//! Auto-reply for commands sent to the account by private message
//!
//! Users sometimes PM lobby commands to the hosting account instead of
//! typing them in the lobby. They get a single pointer to the right place.

use crate::chat::dispatch::InboundHandler;
use crate::chat::session::ChatSession;
use crate::types::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default reply when no custom text is configured
pub const DEFAULT_REDIRECT_REPLY: &str = "I'm a real person. If you want to send a command, \
you probably want to send it in #multiplayer or in the Discord server.";

pub struct CommandRedirectResponder {
    session: Arc<ChatSession>,
    /// Identity whose messages are never answered
    bot_username: String,
    reply: String,
}

impl CommandRedirectResponder {
    pub fn new(
        session: Arc<ChatSession>,
        bot_username: impl Into<String>,
        reply: impl Into<String>,
    ) -> Self {
        Self {
            session,
            bot_username: bot_username.into(),
            reply: reply.into(),
        }
    }

    /// Whether a message should get the redirect reply
    pub fn should_reply(&self, message: &InboundMessage) -> bool {
        message.is_private()
            && message.text.starts_with('!')
            && message.sender != self.bot_username
            && message.sender != self.session.nickname()
    }
}

#[async_trait]
impl InboundHandler for CommandRedirectResponder {
    fn name(&self) -> &'static str {
        "command_redirect"
    }

    async fn handle(&self, message: &InboundMessage) {
        if !self.should_reply(message) {
            return;
        }

        debug!("Redirecting PM command from {}", message.sender);
        if let Err(e) = self.session.send(&message.sender, &self.reply).await {
            warn!("Failed to reply to {}: {}", message.sender, e);
        }
    }
}
