//! Command/response correlation over the chat broadcast stream
//!
//! Turns "send a create command, wait for the matching broadcast reply"
//! into one asynchronous call with a timeout.

pub mod creator;
pub mod pending;

// Re-export commonly used types
pub use creator::{
    CommandCorrelator, CorrelatorConfig, LobbyCreator, DEFAULT_BOT_USERNAME,
    DEFAULT_CREATE_TIMEOUT,
};
pub use pending::PendingTable;
