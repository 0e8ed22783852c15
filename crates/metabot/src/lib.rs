//! Metabot
//!
//! A chat bot that watches one channel (and its direct messages) for video
//! and image links and answers with a short summary: title, author, duration.
//!
//! ## Architecture
//!
//! ```text
//! IrcTransport --events--> ChatSession --extract/resolve--> OutboundQueue --paced--> IrcTransport
//! ```
//!
//! [`bot::run`] supervises the connection and reconnects with backoff.

pub mod bot;
pub mod config;
pub mod error;
pub mod outbound;
pub mod session;
pub mod telemetry;

pub use config::{Config, ConfigError, ConnectSettings};
pub use error::{BotError, Result};
pub use outbound::{DrainTask, OutboundQueue, OutboundTarget};
pub use session::{ChatMessage, ChatSession, Connection, SessionFlow, SessionIdentity, SessionState};
