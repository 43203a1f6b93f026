//! Lobby Keeper - auto-managed multiplayer lobbies, one per star bracket
//!
//! This crate keeps a fixed roster of osu! multiplayer lobbies alive. A
//! periodic reconciler diffs the bracket catalog against the lobby registry
//! and, for every missing bracket, a command correlator turns the chat
//! network's fire-and-forget `!mp make` command into an awaitable call.

pub mod catalog;
pub mod chat;
pub mod config;
pub mod correlator;
pub mod error;
pub mod initializer;
pub mod metrics;
pub mod reconcile;
pub mod registry;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyError, Result};
pub use types::*;

// Re-export key components
pub use catalog::BracketCatalog;
pub use chat::{ChatSession, ChatTransport};
pub use correlator::{CommandCorrelator, LobbyCreator};
pub use initializer::{LobbyInitializer, RegistryLobbyInitializer};
pub use reconcile::{Reconciler, ReconcileScheduler};
pub use registry::LobbyRegistry;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
