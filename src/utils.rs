//! Utility functions for the lobby keeper

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique reconciliation pass ID
pub fn generate_pass_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}
