//! Configuration management for the lobby keeper
//!
//! Loading from environment variables or TOML, validation, and defaults.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ChatSettings, LobbySettings, ServiceSettings};
