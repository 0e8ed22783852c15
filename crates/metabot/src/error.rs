use thiserror::Error;

use metabot_irc::TransportError;
use metabot_links::ResolveError;

use crate::config::ConfigError;

/// Top-level bot errors.
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Resolver setup failed: {0}")]
    Resolver(#[from] ResolveError),

    #[error("Outbound queue closed")]
    QueueClosed,

    #[error("Disconnected: {0}")]
    Disconnected(String),
}

/// A specialized Result type for bot operations.
pub type Result<T> = std::result::Result<T, BotError>;
