//! Chat session: connection lifecycle and the link-resolution pipeline.
//!
//! ```text
//! Disconnected -> Connecting -> NickNegotiation -> Joined
//!                                    ^   |            |
//!                                    +---+ in use     | disconnect
//!                                                     v
//!                                               Disconnected
//! ```
//!
//! Every inbound message is handled to completion (extract, resolve,
//! enqueue) before the next event is read, so replies keep per-sender order.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use metabot_irc::{EventReceiver, Transport, TransportEvent};
use metabot_links::{extract, LinkResolver};

use crate::error::Result;
use crate::outbound::{OutboundQueue, OutboundTarget};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    NickNegotiation,
    Joined,
}

/// An inbound chat message, reduced to what routing needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender_nick: String,
    pub is_private: bool,
    pub text: String,
}

impl ChatMessage {
    /// Channel messages are answered in the channel, direct messages privately.
    pub fn reply_target(&self) -> OutboundTarget {
        if self.is_private {
            OutboundTarget::DirectMessage(self.sender_nick.clone())
        } else {
            OutboundTarget::Channel
        }
    }
}

/// Who the bot is and where it lives. Survives reconnects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub channel: String,
    pub nickname: String,
    pub nick_suffix: String,
}

/// Per-connection capabilities handed to the session.
pub struct Connection<T> {
    pub transport: Arc<T>,
    pub queue: OutboundQueue,
}

/// What the caller should do after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFlow {
    Continue,
    Disconnected(String),
}

pub struct ChatSession<R> {
    identity: SessionIdentity,
    state: SessionState,
    /// Whether the server welcomed us on the current connection.
    registered: bool,
    resolver: Arc<R>,
}

impl<R: LinkResolver> ChatSession<R> {
    pub fn new(identity: SessionIdentity, resolver: Arc<R>) -> Self {
        Self {
            identity,
            state: SessionState::Disconnected,
            registered: false,
            resolver,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current nickname candidate.
    pub fn nickname(&self) -> &str {
        &self.identity.nickname
    }

    pub fn channel(&self) -> &str {
        &self.identity.channel
    }

    /// True once the current (or just-ended) connection got past registration.
    pub fn registered(&self) -> bool {
        self.registered
    }

    /// A connection attempt is starting.
    pub fn begin_connect(&mut self) {
        self.state = SessionState::Connecting;
        self.registered = false;
    }

    /// The transport is up: request our nickname.
    pub async fn on_connected<T: Transport>(&mut self, conn: &Connection<T>) -> Result<()> {
        self.state = SessionState::NickNegotiation;
        conn.transport.set_nickname(&self.identity.nickname).await?;
        debug!(nickname = %self.identity.nickname, "Requested nickname");
        Ok(())
    }

    /// Drive the session from connect until the transport reports a disconnect.
    ///
    /// Returns the disconnect reason.
    pub async fn run<T: Transport>(
        &mut self,
        conn: &Connection<T>,
        events: &mut EventReceiver,
    ) -> Result<String> {
        self.on_connected(conn).await?;

        while let Some(event) = events.recv().await {
            if let SessionFlow::Disconnected(reason) = self.handle_event(conn, event).await? {
                return Ok(reason);
            }
        }

        self.state = SessionState::Disconnected;
        Ok("event stream ended".to_string())
    }

    pub async fn handle_event<T: Transport>(
        &mut self,
        conn: &Connection<T>,
        event: TransportEvent,
    ) -> Result<SessionFlow> {
        match event {
            TransportEvent::Welcome => {
                self.registered = true;
                conn.transport.join(&self.identity.channel).await?;
                self.state = SessionState::Joined;
                info!(
                    nickname = %self.identity.nickname,
                    channel = %self.identity.channel,
                    "Registered, joining channel"
                );
            }
            TransportEvent::NicknameInUse => {
                self.identity.nickname.push_str(&self.identity.nick_suffix);
                warn!(nickname = %self.identity.nickname, "Nickname in use, retrying");
                conn.transport.set_nickname(&self.identity.nickname).await?;
            }
            TransportEvent::ChannelMessage { sender, text, .. } => {
                self.on_message(
                    conn,
                    ChatMessage {
                        sender_nick: sender,
                        is_private: false,
                        text,
                    },
                )
                .await?;
            }
            TransportEvent::DirectMessage { sender, text } => {
                self.on_message(
                    conn,
                    ChatMessage {
                        sender_nick: sender,
                        is_private: true,
                        text,
                    },
                )
                .await?;
            }
            TransportEvent::Disconnected { reason } => {
                self.state = SessionState::Disconnected;
                return Ok(SessionFlow::Disconnected(reason));
            }
        }
        Ok(SessionFlow::Continue)
    }

    /// Run one message through extract -> resolve -> enqueue.
    ///
    /// Returns the number of lines queued; zero means the bot stays silent.
    #[instrument(skip(self, conn, msg), fields(sender = %msg.sender_nick, private = msg.is_private))]
    pub async fn on_message<T: Transport>(
        &self,
        conn: &Connection<T>,
        msg: ChatMessage,
    ) -> Result<usize> {
        let Some(link) = extract(&msg.text) else {
            return Ok(0);
        };

        let target = msg.reply_target();
        let Some(lines) = self.resolver.resolve(&link).await else {
            debug!(provider = %link.provider, "No metadata, staying silent");
            return Ok(0);
        };

        conn.queue.enqueue_all(target, lines)
    }
}
