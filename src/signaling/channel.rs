use crate::error::SignalingError;
use crate::logger::{log, warn};
use crate::signaling::envelope::Envelope;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

/// What the relay connection reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    /// One inbound text frame, not yet parsed
    Message(String),
    Closed,
    Error(String),
}

pub type ChannelEventSink = Arc<dyn Fn(ChannelEvent) + Send + Sync>;

/// An established relay connection: an outbound text queue plus the tasks
/// pumping it.
pub struct Link {
    outbound: mpsc::UnboundedSender<String>,
    reader: Option<JoinHandle<()>>,
}

impl Link {
    pub fn new(outbound: mpsc::UnboundedSender<String>, reader: Option<JoinHandle<()>>) -> Self {
        Self { outbound, reader }
    }

    fn send(&self, text: String) -> bool {
        self.outbound.send(text).is_ok()
    }

    /// Stops reading right away; the writer flushes what is queued, then closes.
    fn shutdown(self) {
        if let Some(reader) = self.reader {
            reader.abort();
        }
    }
}

/// Opens relay connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, endpoint: &Url, events: ChannelEventSink) -> Result<Link, SignalingError>;
}

enum ChannelState {
    Closed,
    Open { link: Link, generation: u64 },
}

/// The single duplex connection to the relay.
///
/// `connect` takes `&mut self`, so a second connect cannot start while one is
/// pending, and it is a no-op once open.
pub struct SignalingChannel {
    endpoint: Url,
    dialer: Arc<dyn Dialer>,
    state: ChannelState,
}

impl SignalingChannel {
    pub fn new(endpoint: Url, dialer: Arc<dyn Dialer>) -> Self {
        Self {
            endpoint,
            dialer,
            state: ChannelState::Closed,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, ChannelState::Open { .. })
    }

    /// Generation of the open connection; events tagged with anything else are stale.
    pub fn generation(&self) -> Option<u64> {
        match self.state {
            ChannelState::Open { generation, .. } => Some(generation),
            ChannelState::Closed => None,
        }
    }

    pub async fn connect(
        &mut self,
        generation: u64,
        events: ChannelEventSink,
    ) -> Result<(), SignalingError> {
        if self.is_open() {
            return Ok(());
        }
        log(&format!("Connecting to signaling server at {}", self.endpoint));
        let link = self.dialer.dial(&self.endpoint, events).await?;
        log("WebSocket connected");
        self.state = ChannelState::Open { link, generation };
        Ok(())
    }

    /// Fire-and-forget; returns false when the envelope was dropped.
    pub fn send(&self, envelope: &Envelope) -> bool {
        let ChannelState::Open { link, .. } = &self.state else {
            warn(&format!("Dropping {}: signaling channel not open", envelope.kind()));
            return false;
        };
        let text = match envelope.encode() {
            Ok(text) => text,
            Err(e) => {
                warn(&format!("Failed to encode {}: {e}", envelope.kind()));
                return false;
            }
        };
        if link.send(text) {
            log(&format!("Sent {}", envelope.kind()));
            true
        } else {
            warn(&format!("Dropping {}: writer has stopped", envelope.kind()));
            false
        }
    }

    /// Returns true if a connection was actually closed.
    pub fn close(&mut self) -> bool {
        match std::mem::replace(&mut self.state, ChannelState::Closed) {
            ChannelState::Open { link, .. } => {
                link.shutdown();
                log("Signaling channel closed");
                true
            }
            ChannelState::Closed => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CallId;
    use crate::signaling::envelope::Signal;
    use crate::testkit::ScriptedDialer;

    fn channel(dialer: &ScriptedDialer) -> SignalingChannel {
        SignalingChannel::new(
            Url::parse("ws://localhost:8000/ws").unwrap(),
            Arc::new(dialer.clone()),
        )
    }

    fn sink() -> ChannelEventSink {
        Arc::new(|_| {})
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let dialer = ScriptedDialer::default();
        let mut channel = channel(&dialer);

        channel.connect(1, sink()).await.unwrap();
        channel.connect(2, sink()).await.unwrap();

        assert_eq!(dialer.dials(), 1);
        assert_eq!(channel.generation(), Some(1));
    }

    #[tokio::test]
    async fn send_before_connect_is_dropped() {
        let dialer = ScriptedDialer::default();
        let mut channel = channel(&dialer);
        let hangup = Envelope::new(CallId::parse("c").unwrap(), Signal::Hangup);

        assert!(!channel.send(&hangup));
        channel.connect(1, sink()).await.unwrap();
        assert!(channel.send(&hangup));
        assert_eq!(dialer.sent(), vec![hangup]);
    }

    #[tokio::test]
    async fn failed_dial_leaves_channel_closed() {
        let dialer = ScriptedDialer::failing();
        let mut channel = channel(&dialer);

        assert!(channel.connect(1, sink()).await.is_err());
        assert!(!channel.is_open());
        assert!(!channel.close());
    }

    #[tokio::test]
    async fn close_then_reconnect_uses_a_new_connection() {
        let dialer = ScriptedDialer::default();
        let mut channel = channel(&dialer);

        channel.connect(1, sink()).await.unwrap();
        assert!(channel.close());
        assert!(!channel.close());
        channel.connect(2, sink()).await.unwrap();

        assert_eq!(dialer.dials(), 2);
        assert_eq!(channel.generation(), Some(2));
    }
}
