//! Main application state and service coordination
//!
//! `AppState` wires the chat session, correlator, registry, reconciler and
//! health endpoints together and owns the background tasks.

use crate::catalog::BracketCatalog;
use crate::chat::dispatch::InboundDispatcher;
use crate::chat::irc::IrcTransport;
use crate::chat::responder::CommandRedirectResponder;
use crate::chat::session::ChatSession;
use crate::chat::transport::ChatTransport;
use crate::config::AppConfig;
use crate::correlator::CommandCorrelator;
use crate::initializer::RegistryLobbyInitializer;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::reconcile::{CreatorIdentity, ReconcileScheduler, Reconciler};
use crate::registry::{InMemoryLobbyRegistry, JsonFileLobbyRegistry, LobbyRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Chat connection error: {message}")]
    ChatConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    session: Arc<ChatSession>,
    correlator: Arc<CommandCorrelator>,
    registry: Arc<dyn LobbyRegistry>,
    reconciler: Reconciler,

    metrics_collector: Arc<MetricsCollector>,
    health_server: Arc<HealthServer>,

    /// Cleared when the inbound stream closes
    chat_connected: Arc<AtomicBool>,
    connection_lost: Arc<Notify>,

    shutdown_tx: watch::Sender<bool>,
    scheduler: Option<JoinHandle<()>>,
    background_tasks: Vec<JoinHandle<()>>,

    is_running: bool,
}

impl AppState {
    /// Connect to the chat network and build every component
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!(
            "Connecting to {}:{} as {}",
            config.chat.host, config.chat.port, config.chat.username
        );

        let transport = IrcTransport::connect(config.irc_config())
            .await
            .map_err(|e| ServiceError::ChatConnection {
                message: e.to_string(),
            })?;

        Self::with_transport(config, Arc::new(transport))
    }

    /// Build every component on top of an existing transport
    pub fn with_transport(
        config: AppConfig,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<Self, ServiceError> {
        let catalog = config.catalog().map_err(|e| ServiceError::Configuration {
            message: format!("{:#}", e),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let session = Arc::new(ChatSession::new(transport));
        let correlator = Arc::new(CommandCorrelator::new(
            session.clone(),
            config.correlator_config(),
        ));

        let registry = Self::initialize_registry(&config);
        let initializer = Arc::new(RegistryLobbyInitializer::new(registry.clone()));

        let reconciler = Reconciler::new(
            Arc::new(catalog),
            registry.clone(),
            correlator.clone(),
            initializer,
            CreatorIdentity {
                creator_id: config.chat.username.clone(),
                creator_discord_id: config.lobbies.creator_discord_id.clone(),
            },
        )
        .with_metrics(metrics_collector.clone());

        let chat_connected = Arc::new(AtomicBool::new(false));
        let health_server = Arc::new(
            HealthServer::new(
                HealthServerConfig {
                    port: config.service.health_port,
                    host: "0.0.0.0".to_string(),
                },
                metrics_collector.clone(),
            )
            .with_reconciler(reconciler.clone())
            .with_chat_status(chat_connected.clone()),
        );

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            session,
            correlator,
            registry,
            reconciler,
            metrics_collector,
            health_server,
            chat_connected,
            connection_lost: Arc::new(Notify::new()),
            shutdown_tx,
            scheduler: None,
            background_tasks: Vec::new(),
            is_running: false,
        })
    }

    fn initialize_registry(config: &AppConfig) -> Arc<dyn LobbyRegistry> {
        match &config.lobbies.registry_path {
            Some(path) => {
                info!("Using lobby registry file {}", path.display());
                Arc::new(JsonFileLobbyRegistry::new(path.clone()))
            }
            None => {
                warn!("No registry path configured, lobby records will not persist");
                Arc::new(InMemoryLobbyRegistry::new())
            }
        }
    }

    /// Start inbound dispatch, the health server and reconciliation
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.is_running {
            return Err(ServiceError::Initialization {
                message: "Service already started".to_string(),
            });
        }
        info!("Starting lobby keeper");
        self.is_running = true;

        self.start_inbound_dispatch();
        self.start_health_server();
        self.start_uptime_task();

        if self.config.lobbies.enabled {
            let scheduler =
                ReconcileScheduler::new(self.reconciler.clone(), self.config.reconcile_interval());
            self.scheduler = Some(scheduler.spawn(self.shutdown_tx.subscribe()));
        } else {
            info!("Lobby creation disabled, reconciliation not scheduled");
        }

        info!("✅ Lobby keeper started");
        Ok(())
    }

    fn start_inbound_dispatch(&mut self) {
        let dispatcher = InboundDispatcher::new()
            .with_handler(self.correlator.clone())
            .with_handler(Arc::new(CommandRedirectResponder::new(
                self.session.clone(),
                self.config.chat.bot_username.clone(),
                self.config.redirect_reply(),
            )));

        // Subscribe before anything is sent so no confirmation can be missed
        let dispatch = dispatcher.spawn(self.session.subscribe());
        self.chat_connected.store(true, Ordering::Relaxed);

        let chat_connected = self.chat_connected.clone();
        let connection_lost = self.connection_lost.clone();
        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = dispatch.await {
                error!("Inbound dispatcher failed: {}", e);
            }
            chat_connected.store(false, Ordering::Relaxed);
            connection_lost.notify_one();
        }));
    }

    fn start_health_server(&mut self) {
        let health_server = self.health_server.clone();
        let port = self.config.service.health_port;

        self.background_tasks.push(tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            }
        }));

        info!("Health and metrics endpoints on port {}", port);
    }

    fn start_uptime_task(&mut self) {
        let metrics_collector = self.metrics_collector.clone();
        let mut shutdown = self.shutdown_tx.subscribe();

        self.background_tasks.push(tokio::spawn(async move {
            let started = Instant::now();
            let mut interval = tokio::time::interval(Duration::from_secs(15));

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        metrics_collector
                            .uptime_seconds
                            .set(started.elapsed().as_secs() as i64);
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("Uptime task stopped");
        }));
    }

    /// Resolves when the chat connection is lost
    pub async fn connection_lost(&self) {
        self.connection_lost.notified().await;
    }

    /// Stop reconciliation, wait for in-flight passes, stop everything else
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of lobby keeper");
        self.is_running = false;
        self.shutdown_tx.send_replace(true);

        if let Some(mut scheduler) = self.scheduler.take() {
            match tokio::time::timeout(self.config.shutdown_timeout(), &mut scheduler).await {
                Ok(Ok(())) => info!("✅ Reconciliation stopped"),
                Ok(Err(e)) => {
                    return Err(ServiceError::BackgroundTask {
                        message: format!("Reconciliation scheduler failed: {}", e),
                    })
                }
                Err(_) => {
                    warn!(
                        "Reconciliation still running after {}s, aborting it",
                        self.config.service.shutdown_timeout_seconds
                    );
                    // Dropping the scheduler's task set aborts its passes
                    scheduler.abort();
                    let _ = scheduler.await;
                }
            }
        }

        self.health_server.stop();
        for task in self.background_tasks.drain(..) {
            task.abort();
        }

        info!("Final reconciler statistics: {:?}", self.reconciler.stats());
        info!("✅ Lobby keeper shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.is_running
    }

    pub fn is_chat_connected(&self) -> bool {
        self.chat_connected.load(Ordering::Relaxed)
    }

    pub fn session(&self) -> Arc<ChatSession> {
        self.session.clone()
    }

    pub fn registry(&self) -> Arc<dyn LobbyRegistry> {
        self.registry.clone()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn catalog(&self) -> &BracketCatalog {
        self.reconciler.catalog()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }
}
