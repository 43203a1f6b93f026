//! Reconciliation of owned lobbies against the bracket catalog

pub mod reconciler;
pub mod scheduler;

pub use reconciler::{CreatorIdentity, Reconciler, ReconcilerStats};
pub use scheduler::{ReconcileScheduler, DEFAULT_RECONCILE_INTERVAL};
