//! Scripted collaborators for controller tests.

use crate::error::{MediaError, SignalingError, TransportError};
use crate::peer::connection::{PeerEvent, PeerEventSink, PeerFactory, PeerTransport};
use crate::peer::media::{LocalMedia, LocalTrack, MediaSource, TrackKind};
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::signaling::channel::{ChannelEvent, ChannelEventSink, Dialer, Link};
use crate::signaling::envelope::Envelope;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use url::Url;

#[derive(Default)]
pub struct FakeMedia {
    pub fail: bool,
    pub acquired: AtomicUsize,
    pub handed_out: Mutex<Vec<Arc<LocalTrack>>>,
}

impl FakeMedia {
    pub fn denied() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn tracks(&self) -> Vec<Arc<LocalTrack>> {
        self.handed_out.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSource for FakeMedia {
    async fn acquire_local_media(&self) -> Result<LocalMedia, MediaError> {
        if self.fail {
            return Err(MediaError::AccessDenied("Permission denied".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        let tracks = vec![
            Arc::new(LocalTrack::new(TrackKind::Audio, "audio", "fake")),
            Arc::new(LocalTrack::new(TrackKind::Video, "video", "fake")),
        ];
        self.handed_out.lock().unwrap().extend(tracks.iter().cloned());
        Ok(LocalMedia::new(tracks))
    }
}

#[derive(Default)]
struct PeerLog {
    sinks: Vec<PeerEventSink>,
    ops: Vec<Vec<String>>,
    applied: Vec<Vec<String>>,
    refuse_answers: bool,
}

/// Records every primitive call per created peer. Peer `n` offers
/// `fake-offer-n` and answers `fake-answer-n`; candidates containing `bad`
/// are refused.
#[derive(Clone, Default)]
pub struct FakePeerFactory {
    log: Arc<Mutex<PeerLog>>,
}

impl FakePeerFactory {
    /// Every peer it creates fails `create_answer`.
    pub fn refusing_answers() -> Self {
        let factory = Self::default();
        factory.log.lock().unwrap().refuse_answers = true;
        factory
    }

    pub fn created(&self) -> usize {
        self.log.lock().unwrap().sinks.len()
    }

    pub fn ops(&self, peer: usize) -> Vec<String> {
        self.log.lock().unwrap().ops[peer].clone()
    }

    /// Candidate lines applied on a peer, in order.
    pub fn applied(&self, peer: usize) -> Vec<String> {
        self.log.lock().unwrap().applied[peer].clone()
    }

    /// Fires a transport callback as peer `peer` would.
    pub fn emit(&self, peer: usize, event: PeerEvent) {
        let sink = self.log.lock().unwrap().sinks[peer].clone();
        sink(event);
    }
}

#[async_trait]
impl PeerFactory for FakePeerFactory {
    async fn new_peer(
        &self,
        events: PeerEventSink,
    ) -> Result<Box<dyn PeerTransport>, TransportError> {
        let mut log = self.log.lock().unwrap();
        let index = log.sinks.len();
        log.sinks.push(events);
        log.ops.push(Vec::new());
        log.applied.push(Vec::new());
        Ok(Box::new(FakePeer {
            index,
            log: self.log.clone(),
        }))
    }
}

struct FakePeer {
    index: usize,
    log: Arc<Mutex<PeerLog>>,
}

impl FakePeer {
    fn record(&self, op: impl Into<String>) {
        self.log.lock().unwrap().ops[self.index].push(op.into());
    }
}

#[async_trait]
impl PeerTransport for FakePeer {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.record("create_offer");
        Ok(SessionDescription::offer(format!("fake-offer-{}", self.index)))
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.record("create_answer");
        if self.log.lock().unwrap().refuse_answers {
            return Err(TransportError::Closed);
        }
        Ok(SessionDescription::answer(format!("fake-answer-{}", self.index)))
    }

    async fn set_local_description(&self, desc: &SessionDescription) -> Result<(), TransportError> {
        self.record(format!("local:{}", desc.kind.as_str()));
        Ok(())
    }

    async fn set_remote_description(&self, desc: &SessionDescription) -> Result<(), TransportError> {
        self.record(format!("remote:{}", desc.kind.as_str()));
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        if candidate.candidate.contains("bad") {
            self.record("candidate:refused");
            return Err(TransportError::Closed);
        }
        self.record("candidate");
        self.log.lock().unwrap().applied[self.index].push(candidate.candidate);
        Ok(())
    }

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<(), TransportError> {
        self.record(format!("track:{:?}", track.kind()));
        Ok(())
    }

    fn detach(&self) {
        self.record("detach");
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.record("close");
        Ok(())
    }
}

#[derive(Default)]
struct RelayLog {
    dials: usize,
    sink: Option<ChannelEventSink>,
    outbound: Option<mpsc::UnboundedReceiver<String>>,
    sent: Vec<String>,
}

impl RelayLog {
    fn collect(&mut self) {
        if let Some(rx) = self.outbound.as_mut() {
            while let Ok(text) = rx.try_recv() {
                self.sent.push(text);
            }
        }
    }
}

/// Stands in for the relay: captures what the client sends and lets a test
/// push frames back.
#[derive(Clone, Default)]
pub struct ScriptedDialer {
    fail: bool,
    log: Arc<Mutex<RelayLog>>,
}

impl ScriptedDialer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn dials(&self) -> usize {
        self.log.lock().unwrap().dials
    }

    /// Everything sent so far, across connections.
    pub fn sent(&self) -> Vec<Envelope> {
        let mut log = self.log.lock().unwrap();
        log.collect();
        log.sent
            .iter()
            .map(|text| Envelope::decode(text).unwrap())
            .collect()
    }

    pub fn deliver(&self, envelope: &Envelope) {
        self.deliver_raw(&envelope.encode().unwrap());
    }

    pub fn deliver_raw(&self, text: &str) {
        self.push(ChannelEvent::Message(text.to_owned()));
    }

    /// The relay stops taking frames; later sends fail.
    pub fn stop_reading(&self) {
        let mut log = self.log.lock().unwrap();
        log.collect();
        log.outbound = None;
    }

    pub fn drop_connection(&self) {
        self.push(ChannelEvent::Closed);
    }

    pub fn push(&self, event: ChannelEvent) {
        let sink = self.log.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink(event);
        }
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, _endpoint: &Url, events: ChannelEventSink) -> Result<Link, SignalingError> {
        if self.fail {
            return Err(SignalingError::WebSocket("connection refused".into()));
        }
        let mut log = self.log.lock().unwrap();
        log.collect();
        log.dials += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        log.outbound = Some(rx);
        log.sink = Some(events);
        Ok(Link::new(tx, None))
    }
}
