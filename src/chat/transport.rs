//! Chat transport seam
//!
//! The transport owns the network connection. Everything above it talks in
//! terms of whole lines: send a private message, join a channel, and
//! receive a fan-out stream of inbound messages.

use crate::error::Result;
use crate::types::InboundMessage;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Capacity of inbound broadcast channels
pub const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Bidirectional text pub/sub connection to the chat network
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Nickname this connection is logged in as
    fn nickname(&self) -> &str;

    /// Send one line to a user or channel
    async fn send_privmsg(&self, target: &str, text: &str) -> Result<()>;

    /// Join a channel, resolving once the server confirms or refuses
    async fn join(&self, channel: &str) -> Result<()>;

    /// Subscribe to every inbound message from now on
    fn subscribe(&self) -> broadcast::Receiver<InboundMessage>;
}
