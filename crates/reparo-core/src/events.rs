//! Progress event sinks.
//!
//! The retry loop emits [`ProgressEvent`]s in strict chronological order,
//! one per state transition plus informational notices. Transport is up to
//! the sink.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{ProgressEvent, ProgressKind};

/// Receives progress events. Emission must not block the loop.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Logs each event through `tracing`.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        if event.kind == ProgressKind::Notice {
            debug!(kind = ?event.kind, payload = %event.payload, "{}", event.message);
        } else {
            info!(kind = ?event.kind, payload = %event.payload, "{}", event.message);
        }
    }
}

/// Forwards events over an unbounded channel.
///
/// Once the receiver is dropped, events are discarded silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}
