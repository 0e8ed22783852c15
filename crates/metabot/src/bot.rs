//! Connection supervisor.
//!
//! Owns the reconnect loop around a [`ChatSession`]: connect, run until the
//! transport drops, back off, repeat. The session and resolver (including
//! its cache and circuit breakers) live across reconnects; each connection
//! gets a fresh outbound queue.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use metabot_irc::IrcTransport;
use metabot_links::ProviderResolver;

use crate::config::Config;
use crate::error::{BotError, Result};
use crate::outbound::OutboundQueue;
use crate::session::{ChatSession, Connection, SessionIdentity};

const QUIT_MESSAGE: &str = "Shutting down.";

/// Upper bound on waiting for `QUIT` to reach the socket.
const QUIT_GRACE: Duration = Duration::from_secs(2);

enum ConnectionEnd {
    Shutdown,
    Lost(String),
}

/// Run the bot until `shutdown` resolves or reconnecting is given up.
pub async fn run<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let settings = config.connect_settings()?;
    let resolver = Arc::new(ProviderResolver::new(
        &config.resolver,
        config.providers.clone(),
    )?);

    let mut session = ChatSession::new(
        SessionIdentity {
            channel: settings.channel.clone(),
            nickname: settings.nickname.clone(),
            nick_suffix: config.irc.nick_suffix.clone(),
        },
        resolver,
    );

    tokio::pin!(shutdown);
    let mut attempt: u32 = 0;

    loop {
        session.begin_connect();
        info!(host = %settings.host, port = settings.port, "Connecting");

        let connected = tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down.");
                return Ok(());
            }
            res = IrcTransport::connect(&settings.host, settings.port, config.irc.max_line_bytes) => res,
        };

        let reason = match connected {
            Ok((transport, mut events)) => {
                let transport = Arc::new(transport);
                let (queue, drain) = OutboundQueue::spawn(
                    transport.clone(),
                    settings.channel.clone(),
                    config.outbound.send_interval(),
                );
                let conn = Connection {
                    transport: transport.clone(),
                    queue,
                };

                let end = tokio::select! {
                    _ = &mut shutdown => ConnectionEnd::Shutdown,
                    res = session.run(&conn, &mut events) => match res {
                        Ok(reason) => ConnectionEnd::Lost(reason),
                        Err(e) => ConnectionEnd::Lost(e.to_string()),
                    },
                };
                drain.stop();

                match end {
                    ConnectionEnd::Shutdown => {
                        info!("Shutting down.");
                        if let Err(e) = transport.quit(QUIT_MESSAGE, QUIT_GRACE).await {
                            warn!(error = %e, "Failed to send QUIT");
                        }
                        return Ok(());
                    }
                    ConnectionEnd::Lost(reason) => reason,
                }
            }
            Err(e) => e.to_string(),
        };

        attempt = next_attempt(attempt, session.registered());
        warn!(%reason, attempt, "Disconnected from chat server");

        if !config.reconnect.should_retry(attempt) {
            return Err(BotError::Disconnected(reason));
        }

        let delay = config.reconnect.delay(attempt);
        info!(attempt, delay_secs = delay.as_secs(), "Reconnecting after delay");

        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutting down.");
                return Ok(());
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Failed attempts so far, counting the connection that just ended.
///
/// Only a connection the server accepted (welcome received) resets the
/// count; one dropped before registration keeps backing off.
fn next_attempt(previous: u32, registered: bool) -> u32 {
    if registered {
        1
    } else {
        previous.saturating_add(1)
    }
}
