//! Reconciler: aligns owned lobbies with the bracket catalog
//!
//! A pass reads the registry snapshot, issues one creation per bracket whose
//! key is absent, and hands every joined lobby to the initializer. Passes are
//! single-flight: a pass that starts while another is still settling does
//! nothing.

use crate::catalog::BracketCatalog;
use crate::correlator::LobbyCreator;
use crate::error::LobbyError;
use crate::initializer::LobbyInitializer;
use crate::metrics::MetricsCollector;
use crate::registry::LobbyRegistry;
use crate::types::{Bracket, LobbyInitConfig, LobbyRef};
use crate::utils::generate_pass_id;
use futures::future::join_all;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Counters describing the reconciler's history
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcilerStats {
    /// Passes that read the registry successfully
    pub passes_run: u64,
    /// Passes turned away by the single-flight guard
    pub passes_skipped: u64,
    /// Passes aborted because the registry could not be read
    pub registry_failures: u64,
    /// Creation commands issued
    pub creations_attempted: u64,
    /// Lobbies created, joined and initialized
    pub created: u64,
    pub timeouts: u64,
    pub join_failures: u64,
    /// Lobbies that exist but could not be tracked
    pub initialization_failures: u64,
    pub other_failures: u64,
    /// Whether the most recent non-skipped pass failed to read the registry
    pub last_pass_registry_unavailable: bool,
}

impl ReconcilerStats {
    fn record_failure(&mut self, error: &LobbyError) {
        match error {
            LobbyError::Timeout { .. } => self.timeouts += 1,
            LobbyError::JoinFailure { .. } => self.join_failures += 1,
            LobbyError::InitializationFailure { .. } => self.initialization_failures += 1,
            _ => self.other_failures += 1,
        }
    }
}

/// The hosting account lobbies are created for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorIdentity {
    pub creator_id: String,
    pub creator_discord_id: String,
}

/// Periodic control loop body
#[derive(Clone)]
pub struct Reconciler {
    catalog: Arc<BracketCatalog>,
    registry: Arc<dyn LobbyRegistry>,
    creator: Arc<dyn LobbyCreator>,
    initializer: Arc<dyn LobbyInitializer>,
    identity: CreatorIdentity,
    /// Held for the whole of a pass
    guard: Arc<Mutex<()>>,
    stats: Arc<RwLock<ReconcilerStats>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Reconciler {
    pub fn new(
        catalog: Arc<BracketCatalog>,
        registry: Arc<dyn LobbyRegistry>,
        creator: Arc<dyn LobbyCreator>,
        initializer: Arc<dyn LobbyInitializer>,
        identity: CreatorIdentity,
    ) -> Self {
        Self {
            catalog,
            registry,
            creator,
            initializer,
            identity,
            guard: Arc::new(Mutex::new(())),
            stats: Arc::new(RwLock::new(ReconcilerStats::default())),
            metrics: None,
        }
    }

    /// Record pass and creation outcomes in Prometheus
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn catalog(&self) -> &BracketCatalog {
        &self.catalog
    }

    pub fn identity(&self) -> &CreatorIdentity {
        &self.identity
    }

    /// Creations currently awaiting a confirmation
    pub fn pending_creations(&self) -> usize {
        self.creator.pending_count()
    }

    pub fn stats(&self) -> ReconcilerStats {
        match self.stats.read() {
            Ok(stats) => stats.clone(),
            Err(_) => {
                error!("Failed to acquire stats lock");
                ReconcilerStats::default()
            }
        }
    }

    /// Whether a pass is currently in progress
    pub fn is_running(&self) -> bool {
        self.guard.try_lock().is_err()
    }

    /// Run one reconciliation pass, returning the number of creations attempted
    pub async fn reconcile(&self) -> usize {
        let Ok(_pass_guard) = self.guard.try_lock() else {
            info!("Reconciliation pass already in progress, skipping");
            self.update_stats(|stats| stats.passes_skipped += 1);
            self.record_pass("skipped");
            return 0;
        };

        let pass_id = generate_pass_id();
        debug!(%pass_id, "Starting reconciliation pass");

        let snapshot = match self.registry.owned_lobbies(&self.identity.creator_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                let error = LobbyError::RegistryUnavailable {
                    reason: e.to_string(),
                };
                warn!(%pass_id, "Aborting reconciliation pass: {}", error);
                self.update_stats(|stats| {
                    stats.registry_failures += 1;
                    stats.last_pass_registry_unavailable = true;
                });
                self.record_pass("registry_unavailable");
                return 0;
            }
        };

        let missing = self.catalog.missing_from(&snapshot);
        if let Some(metrics) = &self.metrics {
            metrics.missing_brackets.set(missing.len() as i64);
        }

        let attempted = missing.len();
        self.update_stats(|stats| {
            stats.passes_run += 1;
            stats.creations_attempted += attempted as u64;
            stats.last_pass_registry_unavailable = false;
        });

        if missing.is_empty() {
            debug!(
                %pass_id,
                "All {} brackets have a lobby ({} owned)",
                self.catalog.len(),
                snapshot.len()
            );
            self.record_pass("completed");
            return 0;
        }

        info!(
            %pass_id,
            "Reconciliation pass found {} missing bracket(s) of {}",
            attempted,
            self.catalog.len()
        );

        // Titles are distinct, so creations never contend for a pending slot
        join_all(missing.into_iter().map(|bracket| self.fill(bracket, pass_id))).await;

        info!(%pass_id, "Reconciliation pass settled");
        self.record_pass("completed");
        attempted
    }

    /// Create, join and initialize the lobby for one bracket
    async fn fill(&self, bracket: &Bracket, pass_id: Uuid) {
        let title = self.catalog.title_for(bracket);
        let started = Instant::now();

        let result = self.create_and_initialize(bracket, &title).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "created",
                Err(e) => e.kind(),
            };
            metrics.record_creation(outcome, started.elapsed());
            metrics
                .pending_creations
                .set(self.creator.pending_count() as i64);
        }

        match result {
            Ok(lobby) => {
                info!(
                    %pass_id,
                    "Lobby {} is up for bracket {}", lobby.channel_name, bracket
                );
                self.update_stats(|stats| stats.created += 1);
            }
            Err(e) => {
                if let LobbyError::InitializationFailure { lobby_id, .. } = &e {
                    error!(
                        %pass_id,
                        "Lobby {} for bracket {} exists but is not tracked: {}",
                        lobby_id, bracket, e
                    );
                } else {
                    warn!(%pass_id, "Bracket {} stays missing: {}", bracket, e);
                }
                self.update_stats(|stats| stats.record_failure(&e));
            }
        }
    }

    async fn create_and_initialize(
        &self,
        bracket: &Bracket,
        title: &str,
    ) -> Result<LobbyRef, LobbyError> {
        let lobby = self.creator.create(title).await?;

        let config = LobbyInitConfig {
            creator_id: self.identity.creator_id.clone(),
            creator_discord_id: self.identity.creator_discord_id.clone(),
            bracket: bracket.clone(),
        };

        self.initializer
            .initialize(&lobby, config)
            .await
            .map_err(|e| match e.downcast::<LobbyError>() {
                Ok(error @ LobbyError::InitializationFailure { .. }) => error,
                Ok(other) => LobbyError::InitializationFailure {
                    lobby_id: lobby.room_id,
                    reason: other.to_string(),
                },
                Err(e) => LobbyError::InitializationFailure {
                    lobby_id: lobby.room_id,
                    reason: e.to_string(),
                },
            })?;

        Ok(lobby)
    }

    fn update_stats(&self, update: impl FnOnce(&mut ReconcilerStats)) {
        match self.stats.write() {
            Ok(mut stats) => update(&mut stats),
            Err(_) => error!("Failed to acquire stats lock"),
        }
    }

    fn record_pass(&self, outcome: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_pass(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initializer::MockLobbyInitializer;
    use crate::registry::{InMemoryLobbyRegistry, MockLobbyRegistry};
    use crate::types::{OwnedLobby, RoomId};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Notify;

    /// Creator that succeeds for every title, optionally after a gate opens
    struct StubCreator {
        titles: std::sync::Mutex<Vec<String>>,
        next_room: AtomicU64,
        gate: Option<Arc<Notify>>,
        fail_with: Option<LobbyError>,
    }

    impl StubCreator {
        fn new() -> Self {
            Self {
                titles: std::sync::Mutex::new(Vec::new()),
                next_room: AtomicU64::new(1000),
                gate: None,
                fail_with: None,
            }
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::new()
            }
        }

        fn failing(error: LobbyError) -> Self {
            Self {
                fail_with: Some(error),
                ..Self::new()
            }
        }

        fn titles(&self) -> Vec<String> {
            self.titles.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LobbyCreator for StubCreator {
        async fn create(&self, title: &str) -> Result<LobbyRef, LobbyError> {
            self.titles.lock().unwrap().push(title.to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(error) = &self.fail_with {
                return Err(error.clone());
            }
            let room: RoomId = self.next_room.fetch_add(1, Ordering::SeqCst);
            Ok(LobbyRef::new(room))
        }

        fn pending_count(&self) -> usize {
            0
        }
    }

    fn identity() -> CreatorIdentity {
        CreatorIdentity {
            creator_id: "keeper".to_string(),
            creator_discord_id: "42".to_string(),
        }
    }

    fn accepting_initializer() -> MockLobbyInitializer {
        let mut initializer = MockLobbyInitializer::new();
        initializer.expect_initialize().returning(|_, _| Ok(()));
        initializer
    }

    fn registry_with(keys: &[f64]) -> MockLobbyRegistry {
        let snapshot: Vec<OwnedLobby> = keys
            .iter()
            .map(|&min_stars| OwnedLobby { min_stars })
            .collect();
        let mut registry = MockLobbyRegistry::new();
        registry
            .expect_owned_lobbies()
            .returning(move |_| Ok(snapshot.clone()));
        registry
    }

    fn reconciler(
        registry: impl LobbyRegistry + 'static,
        creator: Arc<StubCreator>,
        initializer: impl LobbyInitializer + 'static,
    ) -> Reconciler {
        Reconciler::new(
            Arc::new(BracketCatalog::default_roster()),
            Arc::new(registry),
            creator,
            Arc::new(initializer),
            identity(),
        )
    }

    #[tokio::test]
    async fn test_creates_only_missing_brackets() {
        let creator = Arc::new(StubCreator::new());
        let reconciler = reconciler(
            registry_with(&[3.0, 5.0]),
            creator.clone(),
            accepting_initializer(),
        );

        assert_eq!(reconciler.reconcile().await, 2);

        let mut titles = creator.titles();
        titles.sort();
        assert_eq!(
            titles,
            vec![
                "4-4.99* | o!RL | Auto map select (!about)".to_string(),
                "6-6.99* | o!RL | Auto map select (!about)".to_string(),
            ]
        );

        let stats = reconciler.stats();
        assert_eq!(stats.passes_run, 1);
        assert_eq!(stats.creations_attempted, 2);
        assert_eq!(stats.created, 2);
    }

    #[tokio::test]
    async fn test_full_registry_is_a_no_op() {
        let creator = Arc::new(StubCreator::new());
        let mut initializer = MockLobbyInitializer::new();
        initializer.expect_initialize().never();

        let reconciler = reconciler(
            registry_with(&[3.0, 4.0, 5.0, 6.0]),
            creator.clone(),
            initializer,
        );

        assert_eq!(reconciler.reconcile().await, 0);
        assert!(creator.titles().is_empty());
    }

    #[tokio::test]
    async fn test_owned_count_at_catalog_size_is_a_no_op() {
        let creator = Arc::new(StubCreator::new());
        let mut initializer = MockLobbyInitializer::new();
        initializer.expect_initialize().never();

        let reconciler = reconciler(
            registry_with(&[3.0, 3.0, 4.0, 5.0]),
            creator.clone(),
            initializer,
        );

        assert_eq!(reconciler.reconcile().await, 0);
        assert!(creator.titles().is_empty());
        assert_eq!(reconciler.stats().passes_run, 1);
    }

    #[tokio::test]
    async fn test_zero_key_does_not_satisfy_top_bracket() {
        let creator = Arc::new(StubCreator::new());
        let reconciler = reconciler(
            registry_with(&[0.0, 3.0, 4.0]),
            creator.clone(),
            accepting_initializer(),
        );

        assert_eq!(reconciler.reconcile().await, 2);

        let mut titles = creator.titles();
        titles.sort();
        assert_eq!(
            titles,
            vec![
                "5-5.99* | o!RL | Auto map select (!about)".to_string(),
                "6-6.99* | o!RL | Auto map select (!about)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_failure_aborts_pass() {
        let mut registry = MockLobbyRegistry::new();
        registry
            .expect_owned_lobbies()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("connection refused")));

        let creator = Arc::new(StubCreator::new());
        let mut initializer = MockLobbyInitializer::new();
        initializer.expect_initialize().never();

        let reconciler = reconciler(registry, creator.clone(), initializer);

        assert_eq!(reconciler.reconcile().await, 0);
        assert!(creator.titles().is_empty());

        let stats = reconciler.stats();
        assert_eq!(stats.registry_failures, 1);
        assert_eq!(stats.passes_run, 0);
        assert!(stats.last_pass_registry_unavailable);
        assert!(!reconciler.is_running());
    }

    #[tokio::test]
    async fn test_failed_creations_do_not_initialize() {
        let creator = Arc::new(StubCreator::failing(LobbyError::Timeout {
            title: "any".to_string(),
        }));
        let mut initializer = MockLobbyInitializer::new();
        initializer.expect_initialize().never();

        let reconciler = reconciler(registry_with(&[]), creator.clone(), initializer);

        assert_eq!(reconciler.reconcile().await, 4);
        let stats = reconciler.stats();
        assert_eq!(stats.timeouts, 4);
        assert_eq!(stats.created, 0);
    }

    #[tokio::test]
    async fn test_initialization_failure_is_isolated() {
        let creator = Arc::new(StubCreator::new());
        let mut initializer = MockLobbyInitializer::new();
        initializer
            .expect_initialize()
            .times(2)
            .returning(|lobby, config| {
                if config.bracket.min_stars == 4.0 {
                    Err(anyhow::anyhow!("write failed for {}", lobby.room_id))
                } else {
                    Ok(())
                }
            });

        let reconciler = reconciler(registry_with(&[3.0, 5.0]), creator, initializer);

        assert_eq!(reconciler.reconcile().await, 2);
        let stats = reconciler.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.initialization_failures, 1);
    }

    #[tokio::test]
    async fn test_initializer_receives_bracket_and_identity() {
        let creator = Arc::new(StubCreator::new());
        let mut initializer = MockLobbyInitializer::new();
        initializer
            .expect_initialize()
            .withf(|lobby, config| {
                lobby.channel_name == format!("#mp_{}", lobby.room_id)
                    && config.creator_id == "keeper"
                    && config.creator_discord_id == "42"
                    && config.bracket.min_stars == 6.0
                    && config.bracket.score_v2
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let reconciler = reconciler(registry_with(&[3.0, 4.0, 5.0]), creator, initializer);
        assert_eq!(reconciler.reconcile().await, 1);
    }

    #[tokio::test]
    async fn test_second_pass_after_initialization_is_idempotent() {
        let registry = Arc::new(InMemoryLobbyRegistry::new());
        let creator = Arc::new(StubCreator::new());
        let reconciler = Reconciler::new(
            Arc::new(BracketCatalog::default_roster()),
            registry.clone(),
            creator.clone(),
            Arc::new(crate::initializer::RegistryLobbyInitializer::new(registry)),
            identity(),
        );

        assert_eq!(reconciler.reconcile().await, 4);
        assert_eq!(reconciler.reconcile().await, 0);
        assert_eq!(creator.titles().len(), 4);
    }

    #[tokio::test]
    async fn test_overlapping_pass_is_skipped() {
        let gate = Arc::new(Notify::new());
        let creator = Arc::new(StubCreator::gated(gate.clone()));
        let reconciler = reconciler(
            registry_with(&[3.0, 4.0, 5.0]),
            creator.clone(),
            accepting_initializer(),
        );

        let first = {
            let reconciler = reconciler.clone();
            tokio::spawn(async move { reconciler.reconcile().await })
        };

        while creator.titles().is_empty() {
            tokio::task::yield_now().await;
        }
        assert!(reconciler.is_running());

        assert_eq!(reconciler.reconcile().await, 0);
        assert_eq!(creator.titles().len(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(reconciler.stats().passes_skipped, 1);
        assert!(!reconciler.is_running());
    }

    #[tokio::test]
    async fn test_metrics_are_recorded() {
        let metrics = Arc::new(MetricsCollector::new().unwrap());
        let reconciler = reconciler(
            registry_with(&[3.0, 4.0]),
            Arc::new(StubCreator::new()),
            accepting_initializer(),
        )
        .with_metrics(metrics.clone());

        reconciler.reconcile().await;

        assert_eq!(
            metrics
                .reconcile_passes_total
                .with_label_values(&["completed"])
                .get(),
            1
        );
        assert_eq!(
            metrics.creations_total.with_label_values(&["created"]).get(),
            2
        );
        assert_eq!(metrics.missing_brackets.get(), 2);
    }
}
