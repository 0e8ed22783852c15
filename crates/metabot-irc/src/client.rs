//! Line-oriented IRC adapter implementing [`Transport`].
//!
//! A connection runs two tasks:
//! - **reader**: decodes lines, answers `PING`, forwards events, and emits a
//!   final [`TransportEvent::Disconnected`] when the socket closes.
//! - **writer**: drains the command channel onto the socket and stops after
//!   writing `QUIT`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{AnyDelimiterCodec, Framed};
use tracing::{debug, info, trace, warn};

use crate::line::{self, IrcLine};
use crate::transport::{EventReceiver, Transport, TransportError, TransportEvent};

/// Longest inbound line accepted before the connection is dropped.
const MAX_INBOUND_LINE: usize = 16 * 1024;

/// Buffered events between the reader task and the session.
const EVENT_BUFFER: usize = 256;

/// Default cap on the text part of an outbound message.
pub const DEFAULT_MAX_LINE_BYTES: usize = 400;

type LineFramed = Framed<TcpStream, AnyDelimiterCodec>;

/// A single IRC server connection.
pub struct IrcTransport {
    outgoing: mpsc::UnboundedSender<String>,
    registered: AtomicBool,
    max_line_bytes: usize,
    reader: JoinHandle<()>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl IrcTransport {
    /// Connect to `host:port` and start the reader and writer tasks.
    pub async fn connect(
        host: &str,
        port: u16,
        max_line_bytes: usize,
    ) -> Result<(Self, EventReceiver), TransportError> {
        let stream = TcpStream::connect((host, port)).await?;
        info!(host, port, "Connected to chat server");

        let codec =
            AnyDelimiterCodec::new_with_max_length(b"\n".to_vec(), b"\r\n".to_vec(), MAX_INBOUND_LINE);
        let (sink, stream) = Framed::new(stream, codec).split();

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        let writer = tokio::spawn(write_loop(sink, out_rx));
        let reader = tokio::spawn(read_loop(stream, out_tx.clone(), event_tx));

        Ok((
            Self {
                outgoing: out_tx,
                registered: AtomicBool::new(false),
                max_line_bytes,
                reader,
                writer: Mutex::new(Some(writer)),
            },
            event_rx,
        ))
    }

    fn send_raw(&self, raw: String) -> Result<(), TransportError> {
        trace!(line = %raw, "Queueing raw line");
        self.outgoing.send(raw).map_err(|_| TransportError::Closed)
    }

    /// Leave the network with a parting message.
    ///
    /// Waits up to `grace` for the writer to put `QUIT` on the wire.
    pub async fn quit(&self, message: &str, grace: Duration) -> Result<(), TransportError> {
        self.send_raw(line::quit_command(&line::clean_outbound(
            message,
            self.max_line_bytes,
        )))?;

        let writer = self
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(writer) = writer {
            if tokio::time::timeout(grace, writer).await.is_err() {
                warn!(grace_ms = grace.as_millis() as u64, "QUIT not flushed in time");
            }
        }
        Ok(())
    }
}

impl Drop for IrcTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl Transport for IrcTransport {
    async fn set_nickname(&self, nickname: &str) -> Result<(), TransportError> {
        self.send_raw(line::nick_command(nickname))?;
        if !self.registered.swap(true, Ordering::SeqCst) {
            self.send_raw(line::user_command(nickname))?;
        }
        Ok(())
    }

    async fn join(&self, channel: &str) -> Result<(), TransportError> {
        self.send_raw(line::join_command(channel))
    }

    async fn send(&self, target: &str, text: &str) -> Result<(), TransportError> {
        let text = line::clean_outbound(text, self.max_line_bytes);
        self.send_raw(line::privmsg_command(target, &text))
    }
}

async fn write_loop(
    mut sink: SplitSink<LineFramed, String>,
    mut outgoing: mpsc::UnboundedReceiver<String>,
) {
    while let Some(raw) = outgoing.recv().await {
        let quitting = line::is_quit(&raw);
        if let Err(e) = sink.send(raw).await {
            warn!(error = %e, "Failed to write to chat server");
            break;
        }
        if quitting {
            break;
        }
    }
    debug!("Writer task stopped");
}

async fn read_loop(
    mut stream: SplitStream<LineFramed>,
    outgoing: mpsc::UnboundedSender<String>,
    events: mpsc::Sender<TransportEvent>,
) {
    let reason = loop {
        let frame = match stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break format!("read error: {e}"),
            None => break "connection closed by server".to_string(),
        };

        let raw = String::from_utf8_lossy(&frame);
        let Some(parsed) = IrcLine::parse(&raw) else {
            continue;
        };
        trace!(command = %parsed.command, "Received line");

        match parsed.command.as_str() {
            "PING" => {
                let token = parsed.param(0).unwrap_or_default();
                if outgoing.send(line::pong_command(token)).is_err() {
                    break "writer stopped".to_string();
                }
            }
            "ERROR" => {
                warn!(message = parsed.param(0).unwrap_or_default(), "Server sent ERROR");
            }
            _ => {
                if let Some(event) = parsed.to_event() {
                    if events.send(event).await.is_err() {
                        debug!("Event receiver dropped, reader stopping");
                        return;
                    }
                }
            }
        }
    };

    info!(%reason, "Chat connection lost");
    let _ = events.send(TransportEvent::Disconnected { reason }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_registration_ping_and_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read, mut write) = socket.into_split();
            let mut lines = BufReader::new(read).lines();

            let mut received = Vec::new();
            received.push(lines.next_line().await.unwrap().unwrap());
            received.push(lines.next_line().await.unwrap().unwrap());

            write
                .write_all(b"PING :irc.test\r\n:irc.test 001 bot :Welcome\r\n:jane!j@h PRIVMSG #chan :hi\r\n")
                .await
                .unwrap();
            received.push(lines.next_line().await.unwrap().unwrap());
            received.push(lines.next_line().await.unwrap().unwrap());
            received
        });

        let (transport, mut events) = IrcTransport::connect("127.0.0.1", port, DEFAULT_MAX_LINE_BYTES)
            .await
            .unwrap();
        transport.set_nickname("bot").await.unwrap();

        assert_eq!(events.recv().await, Some(TransportEvent::Welcome));
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::ChannelMessage {
                sender: "jane".into(),
                channel: "#chan".into(),
                text: "hi".into(),
            })
        );
        transport.send("#chan", "Title: x\nJOIN #evil").await.unwrap();

        let received = server.await.unwrap();
        assert_eq!(received[0], "NICK bot");
        assert_eq!(received[1], "USER bot 0 * :bot");
        assert_eq!(received[2], "PONG :irc.test");
        assert_eq!(received[3], "PRIVMSG #chan :Title: xJOIN #evil");

        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Disconnected { .. })
        ));
    }

    #[tokio::test]
    async fn test_quit_is_flushed_before_returning() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut lines = BufReader::new(socket).lines();
            let mut received = Vec::new();
            for _ in 0..3 {
                received.push(lines.next_line().await.unwrap().unwrap());
            }
            received
        });

        let (transport, _events) = IrcTransport::connect("127.0.0.1", port, DEFAULT_MAX_LINE_BYTES)
            .await
            .unwrap();
        transport.set_nickname("bot").await.unwrap();
        transport
            .quit("Shutting down.", Duration::from_secs(5))
            .await
            .unwrap();
        drop(transport);

        let received = server.await.unwrap();
        assert_eq!(received[2], "QUIT :Shutting down.");
    }
}
