//! Outbound create command and inbound confirmation grammar
//!
//! The bot acknowledges `!mp make <title>` with a broadcast line of the form
//! `Created the tournament match <url-prefix>/mp/<id> <title>`. There is no
//! request id in either direction; the title is the only correlation key.

use crate::types::RoomId;

/// Default url prefix of match links in confirmations
pub const DEFAULT_MATCH_URL_PREFIX: &str = "https://osu.ppy.sh";

const CONFIRMATION_HEAD: &str = "Created the tournament match ";

/// Build the create command line for a lobby title
pub fn make_command(title: &str) -> String {
    format!("!mp make {}", title)
}

/// A parsed room-created confirmation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub room_id: RoomId,
    pub title: String,
}

/// Parser for room-created confirmations
#[derive(Debug, Clone)]
pub struct ConfirmationParser {
    /// Everything in front of `/mp/<id>`
    link_prefix: String,
}

impl ConfirmationParser {
    pub fn new(url_prefix: &str) -> Self {
        Self {
            link_prefix: format!("{}/mp/", url_prefix.trim_end_matches('/')),
        }
    }

    /// Parse a confirmation line, `None` if the line is anything else
    pub fn parse(&self, text: &str) -> Option<Confirmation> {
        let rest = text.strip_prefix(CONFIRMATION_HEAD)?;
        let rest = rest.strip_prefix(self.link_prefix.as_str())?;

        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return None;
        }

        let room_id = rest[..digits_end].parse::<RoomId>().ok()?;
        let title = rest[digits_end..].strip_prefix(' ')?;
        if title.is_empty() {
            return None;
        }

        Some(Confirmation {
            room_id,
            title: title.to_string(),
        })
    }
}

impl Default for ConfirmationParser {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_URL_PREFIX)
    }
}
