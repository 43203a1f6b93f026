//! Test fixtures and mock implementations for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use lobby_keeper::chat::{ChatSession, ChatTransport, InboundDispatcher};
use lobby_keeper::correlator::{CommandCorrelator, CorrelatorConfig};
use lobby_keeper::error::Result;
use lobby_keeper::types::{InboundMessage, RoomId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

pub const BOT: &str = "BanchoBot";
pub const NICK: &str = "keeper";

/// Room-created announcement as the bot sends it
pub fn confirmation_text(room_id: RoomId, title: &str) -> String {
    format!(
        "Created the tournament match https://osu.ppy.sh/mp/{} {}",
        room_id, title
    )
}

/// In-memory chat transport driven by the test
///
/// Records every outbound line, lets the test inject inbound messages, and
/// can play the bot by answering each `!mp make` with a confirmation.
pub struct ScriptedTransport {
    nickname: String,
    inbound_tx: Mutex<Option<broadcast::Sender<InboundMessage>>>,
    sent: Mutex<Vec<(String, String)>>,
    joined: Mutex<Vec<String>>,
    failing_joins: Mutex<HashSet<String>>,
    fail_sends: AtomicBool,
    auto_confirm: AtomicBool,
    next_room: AtomicU64,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        let (inbound_tx, _) = broadcast::channel(256);
        Self {
            nickname: NICK.to_string(),
            inbound_tx: Mutex::new(Some(inbound_tx)),
            sent: Mutex::new(Vec::new()),
            joined: Mutex::new(Vec::new()),
            failing_joins: Mutex::new(HashSet::new()),
            fail_sends: AtomicBool::new(false),
            auto_confirm: AtomicBool::new(false),
            next_room: AtomicU64::new(100_000),
        }
    }

    /// Answer every create command with a matching confirmation
    pub fn auto_confirming() -> Self {
        let transport = Self::new();
        transport.auto_confirm.store(true, Ordering::SeqCst);
        transport
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn fail_join(&self, channel: &str) {
        self.failing_joins.lock().unwrap().insert(channel.to_string());
    }

    /// Deliver an inbound message to every subscriber
    pub fn inject(&self, sender: &str, target: &str, text: &str) {
        if let Some(tx) = self.inbound_tx.lock().unwrap().as_ref() {
            let _ = tx.send(InboundMessage::new(sender, target, text));
        }
    }

    /// Close the inbound stream as a lost connection would
    pub fn disconnect(&self) {
        self.inbound_tx.lock().unwrap().take();
    }

    /// Deliver a bot confirmation for `title`
    pub fn confirm(&self, room_id: RoomId, title: &str) {
        self.inject(BOT, NICK, &confirmation_text(room_id, title));
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, target: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == target)
            .map(|(_, text)| text)
            .collect()
    }

    /// Titles of every `!mp make` sent to the bot
    pub fn make_titles(&self) -> Vec<String> {
        self.sent_to(BOT)
            .into_iter()
            .filter_map(|text| text.strip_prefix("!mp make ").map(str::to_string))
            .collect()
    }

    pub fn joined(&self) -> Vec<String> {
        self.joined.lock().unwrap().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inbound_tx
            .lock()
            .unwrap()
            .as_ref()
            .map_or(0, |tx| tx.receiver_count())
    }
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    fn nickname(&self) -> &str {
        &self.nickname
    }

    async fn send_privmsg(&self, target: &str, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("connection reset"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((target.to_string(), text.to_string()));

        if self.auto_confirm.load(Ordering::SeqCst) && target == BOT {
            if let Some(title) = text.strip_prefix("!mp make ") {
                let room_id = self.next_room.fetch_add(1, Ordering::SeqCst);
                self.confirm(room_id, title);
            }
        }
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<()> {
        if self.failing_joins.lock().unwrap().contains(channel) {
            return Err(anyhow::anyhow!("No such channel {}", channel));
        }
        self.joined.lock().unwrap().push(channel.to_string());
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        match self.inbound_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.subscribe(),
            None => broadcast::channel(1).1,
        }
    }
}

/// Session, correlator and running dispatcher over a scripted transport
pub struct ChatHarness {
    pub transport: Arc<ScriptedTransport>,
    pub session: Arc<ChatSession>,
    pub correlator: Arc<CommandCorrelator>,
    pub dispatcher: JoinHandle<()>,
}

impl ChatHarness {
    pub fn new(transport: ScriptedTransport) -> Self {
        Self::with_config(transport, CorrelatorConfig::default())
    }

    pub fn with_config(transport: ScriptedTransport, config: CorrelatorConfig) -> Self {
        let transport = Arc::new(transport);
        let session = Arc::new(ChatSession::new(transport.clone()));
        let correlator = Arc::new(CommandCorrelator::new(session.clone(), config));
        let dispatcher = InboundDispatcher::new()
            .with_handler(correlator.clone())
            .spawn(session.subscribe());

        Self {
            transport,
            session,
            correlator,
            dispatcher,
        }
    }
}

impl Drop for ChatHarness {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

/// Yield until spawned tasks have had a chance to run
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

/// Wait until a condition holds, yielding in between
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}
