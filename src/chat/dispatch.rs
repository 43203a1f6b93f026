//! Inbound message dispatch
//!
//! A single task drains the broadcast stream and hands every message to each
//! registered handler in turn. Handlers never see messages out of the order
//! the transport delivered them, but nothing downstream relies on that.

use crate::types::InboundMessage;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Something that reacts to inbound chat messages
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Handler name for logs
    fn name(&self) -> &'static str;

    async fn handle(&self, message: &InboundMessage);
}

/// Fan-in of the inbound stream to a fixed set of handlers
pub struct InboundDispatcher {
    handlers: Vec<Arc<dyn InboundHandler>>,
}

impl InboundDispatcher {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn InboundHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Deliver one message to every handler
    pub async fn dispatch(&self, message: &InboundMessage) {
        debug!(
            "<- {} [{}]: {}",
            message.sender, message.target, message.text
        );
        for handler in &self.handlers {
            handler.handle(message).await;
        }
    }

    /// Run until the inbound stream closes
    pub fn spawn(self, mut inbound: broadcast::Receiver<InboundMessage>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let names: Vec<_> = self.handlers.iter().map(|h| h.name()).collect();
            info!("Inbound dispatcher started with handlers {:?}", names);

            loop {
                match inbound.recv().await {
                    Ok(message) => self.dispatch(&message).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Inbound dispatcher lagged, {} messages dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            info!("Inbound stream closed, dispatcher stopped");
        })
    }
}

impl Default for InboundDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
