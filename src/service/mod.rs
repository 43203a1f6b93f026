//! Service layer for the lobby keeper
//!
//! Application state, component wiring and background task management.

pub mod app;

pub use app::{AppState, ServiceError};
