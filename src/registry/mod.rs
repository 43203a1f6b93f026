//! Persisted record of lobbies owned by hosting accounts

pub mod store;

pub use store::{InMemoryLobbyRegistry, JsonFileLobbyRegistry, LobbyRegistry};

#[cfg(test)]
pub use store::MockLobbyRegistry;
