//! # metabot-irc
//!
//! Chat transport for Metabot.
//!
//! [`Transport`] is the command surface the bot core talks to (nickname,
//! join, send), paired with a stream of [`TransportEvent`]s. [`IrcTransport`]
//! implements it over a plain TCP connection speaking the IRC line protocol;
//! only the handful of commands and numerics the bot needs are understood.

pub mod client;
pub mod line;
pub mod transport;

pub use client::{IrcTransport, DEFAULT_MAX_LINE_BYTES};
pub use line::IrcLine;
pub use transport::{EventReceiver, Transport, TransportError, TransportEvent};
