//! Bracket catalog for the lobby keeper
//!
//! Describes the desired lobby roster: one lobby per skill bracket, each
//! with its own modifiers and title.

pub mod brackets;

pub use brackets::{BracketCatalog, DEFAULT_TITLE_TEMPLATE};
