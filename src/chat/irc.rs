//! Minimal IRC transport
//!
//! Speaks just enough IRC to host lobbies: registration, PING/PONG,
//! PRIVMSG in both directions, and JOIN with the server's answer correlated
//! back to the caller. Losing the connection is terminal; the inbound stream
//! closes and [`IrcTransport::closed`] resolves.

use crate::chat::transport::{ChatTransport, INBOUND_CHANNEL_CAPACITY};
use crate::error::{LobbyError, Result};
use crate::types::InboundMessage;
use anyhow::Context;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Numeric replies that refuse a JOIN
const JOIN_ERROR_REPLIES: &[&str] = &["403", "405", "471", "473", "474", "475", "476"];

/// Connection settings for the IRC transport
#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub join_timeout: Duration,
}

impl Default for IrcConfig {
    fn default() -> Self {
        Self {
            host: "irc.ppy.sh".to_string(),
            port: 6667,
            username: String::new(),
            password: String::new(),
            max_retries: 5,
            retry_delay_ms: 1000,
            join_timeout: Duration::from_secs(10),
        }
    }
}

/// One parsed protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrcLine<'a> {
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: Vec<&'a str>,
}

impl<'a> IrcLine<'a> {
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return None;
        }

        let (prefix, rest) = match line.strip_prefix(':') {
            Some(stripped) => {
                let (prefix, rest) = stripped.split_once(' ')?;
                (Some(prefix), rest)
            }
            None => (None, line),
        };

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };

        let mut parts = head.split_whitespace();
        let command = parts.next()?;
        let mut params: Vec<&str> = parts.collect();
        if let Some(trailing) = trailing {
            params.push(trailing);
        }

        Some(Self {
            prefix,
            command,
            params,
        })
    }

    /// Nickname part of the prefix
    pub fn nick(&self) -> Option<&'a str> {
        self.prefix
            .map(|prefix| prefix.split_once('!').map_or(prefix, |(nick, _)| nick))
    }
}

type JoinResult = std::result::Result<(), String>;

struct Shared {
    nickname: String,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    /// Taken on disconnect so subscribers observe the close
    inbound_tx: Mutex<Option<broadcast::Sender<InboundMessage>>>,
    /// Outstanding joins keyed by lowercase channel name
    pending_joins: Mutex<HashMap<String, oneshot::Sender<JoinResult>>>,
    connected: watch::Sender<bool>,
}

impl Shared {
    async fn write_line(&self, line: &str) -> Result<()> {
        if line.contains(['\r', '\n']) {
            return Err(LobbyError::ChatTransport {
                message: "Refusing to send a line containing a line break".to_string(),
            }
            .into());
        }

        let mut writer = self.writer.lock().await;
        writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .context("Failed to write to IRC connection")?;
        writer.flush().await.context("Failed to flush IRC connection")?;
        Ok(())
    }

    async fn handle_line(&self, raw: &str) {
        let Some(line) = IrcLine::parse(raw) else {
            return;
        };

        match line.command {
            "PING" => {
                let token = line.params.first().copied().unwrap_or_default();
                if let Err(e) = self.write_line(&format!("PONG :{}", token)).await {
                    warn!("Failed to answer PING: {}", e);
                }
            }
            "PRIVMSG" if line.params.len() >= 2 => {
                let message = InboundMessage::new(
                    line.nick().unwrap_or_default(),
                    line.params[0],
                    line.params[1],
                );
                if let Ok(guard) = self.inbound_tx.lock() {
                    if let Some(tx) = guard.as_ref() {
                        // No subscribers is fine
                        let _ = tx.send(message);
                    }
                }
            }
            "JOIN" => {
                let ours = line
                    .nick()
                    .is_some_and(|nick| nick.eq_ignore_ascii_case(&self.nickname));
                if let (true, Some(channel)) = (ours, line.params.first()) {
                    self.resolve_join(channel, Ok(()));
                }
            }
            "001" => info!("Registered on IRC as {}", self.nickname),
            "464" => error!("IRC server rejected the password"),
            code if JOIN_ERROR_REPLIES.contains(&code) && line.params.len() >= 2 => {
                let reason = line.params.last().copied().unwrap_or("join refused");
                self.resolve_join(line.params[1], Err(reason.to_string()));
            }
            _ => {}
        }
    }

    fn resolve_join(&self, channel: &str, result: JoinResult) {
        let sender = self
            .pending_joins
            .lock()
            .ok()
            .and_then(|mut pending| pending.remove(&channel.to_lowercase()));

        match sender {
            Some(sender) => {
                let _ = sender.send(result);
            }
            None => debug!("JOIN reply for {} with no pending join", channel),
        }
    }

    fn mark_disconnected(&self) {
        if let Ok(mut pending) = self.pending_joins.lock() {
            pending.clear();
        }
        if let Ok(mut inbound) = self.inbound_tx.lock() {
            inbound.take();
        }
        self.connected.send_replace(false);
    }
}

/// IRC connection implementing [`ChatTransport`]
pub struct IrcTransport {
    shared: Arc<Shared>,
    join_timeout: Duration,
    reader: JoinHandle<()>,
}

impl IrcTransport {
    /// Connect, register, and start reading
    pub async fn connect(config: IrcConfig) -> Result<Self> {
        let stream = Self::connect_with_retry(&config).await?;
        let (read_half, write_half) = stream.into_split();
        let (inbound_tx, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);
        let (connected, _) = watch::channel(true);

        let shared = Arc::new(Shared {
            nickname: config.username.clone(),
            writer: tokio::sync::Mutex::new(write_half),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            pending_joins: Mutex::new(HashMap::new()),
            connected,
        });

        if !config.password.is_empty() {
            shared.write_line(&format!("PASS {}", config.password)).await?;
        }
        shared
            .write_line(&format!("NICK {}", config.username))
            .await?;
        shared
            .write_line(&format!("USER {} 0 * :{}", config.username, config.username))
            .await?;

        let reader = tokio::spawn(read_loop(shared.clone(), read_half));

        Ok(Self {
            shared,
            join_timeout: config.join_timeout,
            reader,
        })
    }

    /// Attempt to connect with exponential backoff retry
    async fn connect_with_retry(config: &IrcConfig) -> Result<TcpStream> {
        let mut retry_count = 0;
        let mut delay = Duration::from_millis(config.retry_delay_ms);

        loop {
            match TcpStream::connect((config.host.as_str(), config.port)).await {
                Ok(stream) => {
                    info!("Connected to IRC server {}:{}", config.host, config.port);
                    return Ok(stream);
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count > config.max_retries {
                        error!(
                            "Failed to connect to IRC after {} retries",
                            config.max_retries
                        );
                        return Err(LobbyError::ChatTransport {
                            message: format!("Max retries exceeded: {}", e),
                        }
                        .into());
                    }

                    warn!(
                        "IRC connection attempt {} failed: {}. Retrying in {:?}",
                        retry_count, e, delay
                    );

                    sleep(delay).await;
                    delay = Duration::from_millis((delay.as_millis() as u64 * 2).min(30000));
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    /// Resolves once the connection is lost
    pub async fn closed(&self) {
        let mut connected = self.shared.connected.subscribe();
        let _ = connected.wait_for(|up| !*up).await;
    }
}

impl Drop for IrcTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[async_trait]
impl ChatTransport for IrcTransport {
    fn nickname(&self) -> &str {
        &self.shared.nickname
    }

    async fn send_privmsg(&self, target: &str, text: &str) -> Result<()> {
        self.shared
            .write_line(&format!("PRIVMSG {} :{}", target, text))
            .await
    }

    async fn join(&self, channel: &str) -> Result<()> {
        let key = channel.to_lowercase();
        let (tx, rx) = oneshot::channel();
        self.shared
            .pending_joins
            .lock()
            .map_err(|_| LobbyError::InternalError {
                message: "Failed to acquire pending joins lock".to_string(),
            })?
            .insert(key.clone(), tx);

        let forget = || {
            if let Ok(mut pending) = self.shared.pending_joins.lock() {
                pending.remove(&key);
            }
        };

        if let Err(e) = self.shared.write_line(&format!("JOIN {}", channel)).await {
            forget();
            return Err(e);
        }

        match tokio::time::timeout(self.join_timeout, rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(reason))) => Err(LobbyError::ChatTransport {
                message: format!("Server refused to join {}: {}", channel, reason),
            }
            .into()),
            Ok(Err(_)) => Err(LobbyError::ChatTransport {
                message: format!("Connection lost while joining {}", channel),
            }
            .into()),
            Err(_) => {
                forget();
                Err(LobbyError::ChatTransport {
                    message: format!("Timed out joining {}", channel),
                }
                .into())
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        let live = self
            .shared
            .inbound_tx
            .lock()
            .ok()
            .and_then(|tx| tx.as_ref().map(|tx| tx.subscribe()));

        match live {
            Some(rx) => rx,
            None => {
                // Disconnected: hand out a receiver that is already closed
                let (_, rx) = broadcast::channel(1);
                rx
            }
        }
    }
}

async fn read_loop(shared: Arc<Shared>, read_half: OwnedReadHalf) {
    let mut reader = BufReader::new(read_half);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                warn!("IRC server closed the connection");
                break;
            }
            Ok(_) => {
                // Players may send text in any encoding
                let line = String::from_utf8_lossy(&buf);
                shared.handle_line(&line).await;
            }
            Err(e) => {
                error!("IRC connection error: {}", e);
                break;
            }
        }
    }

    shared.mark_disconnected();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_privmsg() {
        let line = IrcLine::parse(
            ":BanchoBot!cho@ppy.sh PRIVMSG keeper :Created the tournament match https://osu.ppy.sh/mp/1 a :b",
        )
        .unwrap();

        assert_eq!(line.nick(), Some("BanchoBot"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(
            line.params,
            vec![
                "keeper",
                "Created the tournament match https://osu.ppy.sh/mp/1 a :b"
            ]
        );
    }

    #[test]
    fn test_parse_without_prefix() {
        let line = IrcLine::parse("PING :cho.ppy.sh\r\n").unwrap();
        assert_eq!(line.prefix, None);
        assert_eq!(line.command, "PING");
        assert_eq!(line.params, vec!["cho.ppy.sh"]);
    }

    #[test]
    fn test_parse_numeric_reply() {
        let line = IrcLine::parse(":cho.ppy.sh 403 keeper #mp_1 :No such channel #mp_1").unwrap();
        assert_eq!(line.nick(), Some("cho.ppy.sh"));
        assert_eq!(line.command, "403");
        assert_eq!(line.params, vec!["keeper", "#mp_1", "No such channel #mp_1"]);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(IrcLine::parse("").is_none());
        assert!(IrcLine::parse("\r\n").is_none());
        assert!(IrcLine::parse(":prefix-only").is_none());
    }

    #[test]
    fn test_irc_config_default() {
        let config = IrcConfig::default();
        assert_eq!(config.host, "irc.ppy.sh");
        assert_eq!(config.port, 6667);
        assert_eq!(config.join_timeout, Duration::from_secs(10));
    }
}
