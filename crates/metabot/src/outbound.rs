//! Rate-limited outbound line queue.
//!
//! A single FIFO shared by every reply target. Producers hand over whole
//! batches (all lines for one inbound message) so replies to different
//! messages never interleave; a background task sends one line per
//! `send_interval` at most.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use metabot_irc::Transport;

use crate::error::{BotError, Result};

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundTarget {
    /// The channel configured at startup.
    Channel,
    /// A private reply to this nickname.
    DirectMessage(String),
}

impl OutboundTarget {
    /// Name to address on the wire.
    pub fn resolve<'a>(&'a self, channel: &'a str) -> &'a str {
        match self {
            OutboundTarget::Channel => channel,
            OutboundTarget::DirectMessage(nick) => nick,
        }
    }
}

/// One line waiting to be sent.
#[derive(Debug, Clone)]
pub struct QueuedLine {
    pub target: OutboundTarget,
    pub text: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Producer handle. Cheap to clone; enqueueing never blocks.
#[derive(Clone)]
pub struct OutboundQueue {
    tx: mpsc::UnboundedSender<Vec<QueuedLine>>,
}

/// Owns the drain task; stopping or dropping it stops sending.
pub struct DrainTask {
    handle: JoinHandle<()>,
}

impl DrainTask {
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for DrainTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl OutboundQueue {
    /// Create the queue and start draining it onto `transport`.
    ///
    /// `channel` is the name [`OutboundTarget::Channel`] resolves to.
    pub fn spawn<T: Transport>(
        transport: Arc<T>,
        channel: String,
        send_interval: Duration,
    ) -> (Self, DrainTask) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(drain(transport, channel, send_interval, rx));
        (Self { tx }, DrainTask { handle })
    }

    /// Queue a single line.
    pub fn enqueue(&self, target: OutboundTarget, text: impl Into<String>) -> Result<()> {
        self.enqueue_all(target, [text.into()]).map(|_| ())
    }

    /// Queue lines as one contiguous block. Returns the number of lines queued.
    pub fn enqueue_all(
        &self,
        target: OutboundTarget,
        lines: impl IntoIterator<Item = String>,
    ) -> Result<usize> {
        let enqueued_at = Utc::now();
        let batch: Vec<QueuedLine> = lines
            .into_iter()
            .map(|text| QueuedLine {
                target: target.clone(),
                text,
                enqueued_at,
            })
            .collect();

        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }
        self.tx.send(batch).map_err(|_| BotError::QueueClosed)?;
        Ok(count)
    }
}

async fn drain<T: Transport>(
    transport: Arc<T>,
    channel: String,
    send_interval: Duration,
    mut rx: mpsc::UnboundedReceiver<Vec<QueuedLine>>,
) {
    let mut ticker = tokio::time::interval(send_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while let Some(batch) = rx.recv().await {
        for line in batch {
            ticker.tick().await;

            let target = line.target.resolve(&channel);
            if let Err(e) = transport.send(target, &line.text).await {
                warn!(error = %e, to = target, "Failed to send line");
                continue;
            }

            let waited_ms = (Utc::now() - line.enqueued_at).num_milliseconds();
            debug!(to = target, waited_ms, "Sent line");
        }
    }

    debug!("Outbound queue closed, drain task stopping");
}
