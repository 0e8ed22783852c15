//! The chat transport capability the bot core depends on.
//!
//! The core never sees wire syntax: it issues commands through [`Transport`]
//! and consumes [`TransportEvent`]s from the receiver returned at connect time.

use std::future::Future;

use thiserror::Error;
use tokio::sync::mpsc;

/// Connection-level events surfaced to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Registration accepted by the server.
    Welcome,
    /// The requested nickname is taken.
    NicknameInUse,
    /// A message sent to a channel.
    ChannelMessage {
        sender: String,
        channel: String,
        text: String,
    },
    /// A message sent directly to the bot.
    DirectMessage { sender: String, text: String },
    /// The connection is gone. Always the last event on a receiver.
    Disconnected { reason: String },
}

/// Receiving half of a connection's event stream.
pub type EventReceiver = mpsc::Receiver<TransportEvent>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error while connecting or on the socket.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection is closed; no further commands can be sent.
    #[error("Connection closed")]
    Closed,
}

/// Commands the bot issues to the chat network.
///
/// Implementations are shared between the session and the outbound drain
/// task, so every method takes `&self`.
pub trait Transport: Send + Sync + 'static {
    /// Request `nickname` for this connection.
    fn set_nickname(&self, nickname: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Join `channel`.
    fn join(&self, channel: &str) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Deliver one line of text to a channel or nickname.
    fn send(&self, target: &str, line: &str) -> impl Future<Output = Result<(), TransportError>> + Send;
}
