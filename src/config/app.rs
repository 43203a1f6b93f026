//! Main application configuration
//!
//! Configuration for the lobby keeper, loaded from environment variables or a
//! TOML file, with validation and default values.

use crate::catalog::BracketCatalog;
use crate::chat::irc::IrcConfig;
use crate::chat::responder::DEFAULT_REDIRECT_REPLY;
use crate::chat::DEFAULT_MATCH_URL_PREFIX;
use crate::correlator::{CorrelatorConfig, DEFAULT_BOT_USERNAME};
use crate::types::Bracket;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub chat: ChatSettings,
    pub lobbies: LobbySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Chat network connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub host: String,
    pub port: u16,
    /// Account the keeper logs in as; also the registry creator id
    pub username: String,
    pub password: String,
    /// Identity that creates rooms and announces them
    pub bot_username: String,
    /// Prefix of the match link in room-created announcements
    pub match_url_prefix: String,
    pub create_timeout_seconds: u64,
    pub join_timeout_seconds: u64,
    pub connect_retries: u32,
    pub retry_delay_ms: u64,
    /// Reply to private `!` commands; `None` keeps the built-in text
    pub redirect_reply: Option<String>,
}

/// Lobby roster settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LobbySettings {
    /// Whether missing lobbies are created at all
    pub enabled: bool,
    pub reconcile_interval_seconds: u64,
    /// Discord id recorded alongside each created lobby
    pub creator_discord_id: String,
    /// JSON registry file; in-memory when unset
    pub registry_path: Option<PathBuf>,
    /// Replaces the default roster when set
    pub brackets: Option<Vec<Bracket>>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "lobby-keeper".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            host: "irc.ppy.sh".to_string(),
            port: 6667,
            username: String::new(),
            password: String::new(),
            bot_username: DEFAULT_BOT_USERNAME.to_string(),
            match_url_prefix: DEFAULT_MATCH_URL_PREFIX.to_string(),
            create_timeout_seconds: 10,
            join_timeout_seconds: 10,
            connect_retries: 5,
            retry_delay_ms: 1000,
            redirect_reply: None,
        }
    }
}

impl Default for LobbySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconcile_interval_seconds: 600, // 10 minutes
            creator_discord_id: String::new(),
            registry_path: None,
            brackets: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from variables supplied by `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Some(port) = lookup("HEALTH_PORT") {
            config.service.health_port = parse_var("HEALTH_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Chat settings
        if let Some(host) = lookup("IRC_HOST") {
            config.chat.host = host;
        }
        if let Some(port) = lookup("IRC_PORT") {
            config.chat.port = parse_var("IRC_PORT", &port)?;
        }
        if let Some(username) = lookup("OSU_USERNAME") {
            config.chat.username = username;
        }
        if let Some(password) = lookup("OSU_IRC_PASSWORD") {
            config.chat.password = password;
        }
        if let Some(bot) = lookup("BOT_USERNAME") {
            config.chat.bot_username = bot;
        }
        if let Some(prefix) = lookup("MATCH_URL_PREFIX") {
            config.chat.match_url_prefix = prefix;
        }
        if let Some(timeout) = lookup("CREATE_TIMEOUT_SECONDS") {
            config.chat.create_timeout_seconds = parse_var("CREATE_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(timeout) = lookup("JOIN_TIMEOUT_SECONDS") {
            config.chat.join_timeout_seconds = parse_var("JOIN_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(retries) = lookup("IRC_CONNECT_RETRIES") {
            config.chat.connect_retries = parse_var("IRC_CONNECT_RETRIES", &retries)?;
        }
        if let Some(delay) = lookup("IRC_RETRY_DELAY_MS") {
            config.chat.retry_delay_ms = parse_var("IRC_RETRY_DELAY_MS", &delay)?;
        }
        if let Some(reply) = lookup("REDIRECT_REPLY") {
            config.chat.redirect_reply = Some(reply);
        }

        // Lobby settings
        if let Some(enabled) = lookup("CREATE_LOBBIES") {
            config.lobbies.enabled = parse_var("CREATE_LOBBIES", &enabled)?;
        }
        if let Some(interval) = lookup("RECONCILE_INTERVAL_SECONDS") {
            config.lobbies.reconcile_interval_seconds =
                parse_var("RECONCILE_INTERVAL_SECONDS", &interval)?;
        }
        if let Some(discord_id) = lookup("DISCORD_BOT_ID") {
            config.lobbies.creator_discord_id = discord_id;
        }
        if let Some(path) = lookup("REGISTRY_PATH") {
            config.lobbies.registry_path = Some(PathBuf::from(path));
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; omitted keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.create_timeout_seconds)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.chat.join_timeout_seconds)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.lobbies.reconcile_interval_seconds)
    }

    /// Configured roster, or the default one
    pub fn catalog(&self) -> Result<BracketCatalog> {
        match &self.lobbies.brackets {
            Some(brackets) => BracketCatalog::new(brackets.clone()),
            None => Ok(BracketCatalog::default_roster()),
        }
    }

    pub fn irc_config(&self) -> IrcConfig {
        IrcConfig {
            host: self.chat.host.clone(),
            port: self.chat.port,
            username: self.chat.username.clone(),
            password: self.chat.password.clone(),
            max_retries: self.chat.connect_retries,
            retry_delay_ms: self.chat.retry_delay_ms,
            join_timeout: self.join_timeout(),
        }
    }

    pub fn correlator_config(&self) -> CorrelatorConfig {
        CorrelatorConfig {
            bot_username: self.chat.bot_username.clone(),
            match_url_prefix: self.chat.match_url_prefix.clone(),
            create_timeout: self.create_timeout(),
        }
    }

    pub fn redirect_reply(&self) -> &str {
        self.chat
            .redirect_reply
            .as_deref()
            .unwrap_or(DEFAULT_REDIRECT_REPLY)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.chat.port == 0 {
        return Err(anyhow!("IRC port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.chat.create_timeout_seconds == 0 {
        return Err(anyhow!("Create timeout must be greater than 0"));
    }
    if config.chat.join_timeout_seconds == 0 {
        return Err(anyhow!("Join timeout must be greater than 0"));
    }
    if config.lobbies.reconcile_interval_seconds == 0 {
        return Err(anyhow!("Reconcile interval must be greater than 0"));
    }

    // Validate chat identities
    if config.chat.host.is_empty() {
        return Err(anyhow!("IRC host cannot be empty"));
    }
    if config.chat.username.is_empty() {
        return Err(anyhow!("Chat username cannot be empty"));
    }
    if config.chat.bot_username.is_empty() {
        return Err(anyhow!("Bot username cannot be empty"));
    }

    config.catalog().context("Invalid bracket configuration")?;

    Ok(())
}
