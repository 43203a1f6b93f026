//! Chat integration for the lobby keeper
//!
//! This module holds the transport seam, the session object that owns the
//! connection, the inbound dispatcher, and the wire grammar of lobby
//! creation commands and confirmations.

pub mod confirmation;
pub mod dispatch;
pub mod irc;
pub mod responder;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use confirmation::{make_command, Confirmation, ConfirmationParser, DEFAULT_MATCH_URL_PREFIX};
pub use dispatch::{InboundDispatcher, InboundHandler};
pub use irc::{IrcConfig, IrcTransport};
pub use responder::{CommandRedirectResponder, DEFAULT_REDIRECT_REPLY};
pub use session::ChatSession;
pub use transport::ChatTransport;
