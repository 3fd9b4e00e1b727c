//! Call lifecycle: owns the call, the peer connection and the relay channel,
//! and funnels user intents, relay frames and transport callbacks through one
//! sequential dispatch loop.

use crate::config::ClientConfig;
use crate::error::{CallError, ConfigError, MediaError, NegotiationError, SignalingError, TransportError};
use crate::logger::{dump_candidate, log, warn};
use crate::negotiation::{CandidateRoute, Negotiator, Screening};
use crate::peer::connection::{PeerEvent, PeerEventSink, PeerFactory, PeerTransport, RtcPeerFactory};
use crate::peer::ice::CandidateQueue;
use crate::peer::media::{LocalMedia, MediaSource, RemoteTrack, SyntheticMedia};
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::session::{CallId, NegotiationState, Role};
use crate::signaling::channel::{ChannelEvent, ChannelEventSink, Dialer, SignalingChannel};
use crate::signaling::envelope::{Envelope, Signal};
use crate::signaling::websocket::WsDialer;
use crate::status::{CallStatus, StatusBoard};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// User intents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    AcquireMedia,
    StartCall,
    /// Raw call id as typed; trimmed before use
    JoinCall(String),
    HangUp,
}

/// Everything the dispatch loop consumes. Relay and peer events carry the
/// generation of the connection that produced them.
pub(crate) enum Event {
    Command(Command),
    Signaling { generation: u64, event: ChannelEvent },
    Peer { generation: u64, event: PeerEvent },
    Inspect(oneshot::Sender<Snapshot>),
    Shutdown,
}

/// Why a call ended; decides the status text shown afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    HangUp,
    PeerDisconnected,
    ConnectivityLost,
    ChannelClosed,
    ChannelError,
    Failed(String),
}

impl EndReason {
    pub fn status_text(&self) -> String {
        match self {
            EndReason::HangUp => "Call ended".to_owned(),
            EndReason::PeerDisconnected => "Peer disconnected".to_owned(),
            EndReason::ConnectivityLost => "Connection lost. Ending call.".to_owned(),
            EndReason::ChannelClosed => "Disconnected from signaling server".to_owned(),
            EndReason::ChannelError => "WebSocket error. Please try again.".to_owned(),
            EndReason::Failed(msg) => format!("Error: {msg}"),
        }
    }
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: NegotiationState,
    pub role: Option<Role>,
    pub call_id: Option<CallId>,
    pub has_peer: bool,
    pub pending_candidates: usize,
    pub channel_open: bool,
    pub has_local_media: bool,
    pub remote_tracks: usize,
    pub status: CallStatus,
}

/// External services the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaSource>,
    pub peers: Arc<dyn PeerFactory>,
    pub dialer: Arc<dyn Dialer>,
}

impl Collaborators {
    /// webrtc-rs peers, a WebSocket relay and non-capturing media.
    pub fn webrtc(config: &ClientConfig) -> Self {
        Self {
            media: Arc::new(SyntheticMedia::new("peercall")),
            peers: Arc::new(RtcPeerFactory::new(config.ice_servers.clone())),
            dialer: Arc::new(WsDialer),
        }
    }
}

struct ActivePeer {
    generation: u64,
    transport: Box<dyn PeerTransport>,
}

pub struct CallController {
    media_source: Arc<dyn MediaSource>,
    peers: Arc<dyn PeerFactory>,
    negotiator: Negotiator,
    channel: SignalingChannel,
    peer: Option<ActivePeer>,
    local_media: Option<LocalMedia>,
    remote_tracks: Vec<Arc<RemoteTrack>>,
    status: StatusBoard,
    events_tx: mpsc::UnboundedSender<Event>,
    events_rx: mpsc::UnboundedReceiver<Event>,
    next_generation: u64,
}

impl CallController {
    pub fn new(config: &ClientConfig, collaborators: Collaborators) -> Result<Self, ConfigError> {
        let endpoint = config.signaling_endpoint()?;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            media_source: collaborators.media,
            peers: collaborators.peers,
            negotiator: Negotiator::new(),
            channel: SignalingChannel::new(endpoint, collaborators.dialer),
            peer: None,
            local_media: None,
            remote_tracks: Vec::new(),
            status: StatusBoard::new(),
            events_tx,
            events_rx,
            next_generation: 0,
        })
    }

    pub fn status(&self) -> watch::Receiver<CallStatus> {
        self.status.subscribe()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.negotiator.state(),
            role: self.negotiator.role(),
            call_id: self.negotiator.call_id().cloned(),
            has_peer: self.peer.is_some(),
            pending_candidates: self.negotiator.pending_len(),
            channel_open: self.channel.is_open(),
            has_local_media: self.local_media.is_some(),
            remote_tracks: self.remote_tracks.len(),
            status: self.status.current(),
        }
    }

    /// Moves the controller onto its own task.
    pub fn spawn(self) -> (CallHandle, JoinHandle<()>) {
        let handle = CallHandle {
            events: self.events_tx.clone(),
            status: self.status.subscribe(),
        };
        (handle, tokio::spawn(self.run()))
    }

    /// Processes events one at a time until shut down.
    pub async fn run(mut self) {
        while let Some(event) = self.events_rx.recv().await {
            if let Event::Shutdown = event {
                self.hang_up().await;
                break;
            }
            self.dispatch(event).await;
        }
        log("Call controller stopped");
    }

    pub(crate) async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Command(Command::AcquireMedia) => self.acquire_media().await,
            Event::Command(Command::StartCall) => self.start_call().await,
            Event::Command(Command::JoinCall(raw)) => self.join_call(&raw).await,
            Event::Command(Command::HangUp) => self.hang_up().await,
            Event::Signaling { generation, event } => self.on_channel_event(generation, event).await,
            Event::Peer { generation, event } => self.on_peer_event(generation, event).await,
            Event::Inspect(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Event::Shutdown => self.hang_up().await,
        }
    }

    pub async fn acquire_media(&mut self) {
        match self.ensure_media().await {
            Ok(()) => {
                if self.negotiator.call().is_none() {
                    self.status.media_ready();
                }
            }
            Err(e) => {
                warn(&format!("Error accessing media devices: {e}"));
                self.status.media_failed(format!("Error: {e}"));
            }
        }
    }

    pub async fn start_call(&mut self) {
        if let Err(e) = self.negotiator.check_start() {
            warn(&format!("Start rejected: {e}"));
            self.status.set_text(e.to_string());
            return;
        }
        if self.local_media.is_none() {
            self.acquire_media().await;
            if self.local_media.is_none() {
                return;
            }
        }
        if let Err(e) = self.begin_as_initiator().await {
            warn(&format!("Error starting call: {e}"));
            self.teardown(EndReason::Failed(e.to_string())).await;
        }
    }

    pub async fn join_call(&mut self, raw: &str) {
        let Some(id) = CallId::parse(raw) else {
            self.status.set_text(NegotiationError::MissingCallId.to_string());
            return;
        };
        if let Err(e) = self.negotiator.check_join(&id) {
            log(&format!("Join ignored: {e}"));
            self.status.set_text(e.to_string());
            return;
        }
        if self.local_media.is_none() {
            self.acquire_media().await;
            if self.local_media.is_none() {
                return;
            }
        }
        if let Err(e) = self.begin_as_responder(id).await {
            warn(&format!("Error joining call: {e}"));
            self.teardown(EndReason::Failed(e.to_string())).await;
        }
    }

    /// Best-effort `hangup`, then teardown. Safe to call at any time.
    pub async fn hang_up(&mut self) {
        if let Some(id) = self.negotiator.call_id() {
            if self.channel.is_open() {
                log("Sending hangup");
                self.channel.send(&Envelope::new(id.clone(), Signal::Hangup));
            }
        }
        self.teardown(EndReason::HangUp).await;
    }

    async fn ensure_media(&mut self) -> Result<(), MediaError> {
        if self.local_media.as_ref().is_some_and(LocalMedia::is_live) {
            log("Local media already acquired");
            return Ok(());
        }
        let media = self.media_source.acquire_local_media().await?;
        log(&format!("Local stream acquired ({} tracks)", media.tracks().len()));
        self.local_media = Some(media);
        Ok(())
    }

    async fn begin_as_initiator(&mut self) -> Result<(), CallError> {
        let id = self.negotiator.start_as_initiator()?;
        self.status.call_started(&id, "Connecting to signaling server...");
        self.open_channel().await?;
        self.open_peer().await?;
        let peer = self.peer.as_ref().ok_or(TransportError::Closed)?;

        let offer = peer.transport.create_offer().await?;
        peer.transport.set_local_description(&offer).await?;
        let envelope = self.negotiator.offer_created(offer)?;
        log("Sending offer");
        if !self.channel.send(&envelope) {
            return Err(SignalingError::NotConnected.into());
        }
        self.status.set_text("Call started, waiting for answer");
        Ok(())
    }

    async fn begin_as_responder(&mut self, id: CallId) -> Result<(), CallError> {
        let envelope = self.negotiator.join_as_responder(id.clone())?;
        self.status.call_started(&id, "Connecting to signaling server...");
        self.open_channel().await?;
        log(&format!("Sending join_call for {id}"));
        if !self.channel.send(&envelope) {
            return Err(SignalingError::NotConnected.into());
        }
        self.status.set_text("Joining call...");
        Ok(())
    }

    async fn open_channel(&mut self) -> Result<(), SignalingError> {
        if self.channel.is_open() {
            return Ok(());
        }
        let generation = self.bump_generation();
        let tx = self.events_tx.clone();
        let sink: ChannelEventSink = Arc::new(move |event| {
            let _ = tx.send(Event::Signaling { generation, event });
        });
        self.channel.connect(generation, sink).await?;
        self.status.set_text("Connected to signaling server");
        Ok(())
    }

    /// Creates the connection handle for this call and attaches local tracks.
    async fn open_peer(&mut self) -> Result<(), TransportError> {
        if self.peer.is_some() {
            return Ok(());
        }
        let generation = self.bump_generation();
        let tx = self.events_tx.clone();
        let sink: PeerEventSink = Arc::new(move |event| {
            let _ = tx.send(Event::Peer { generation, event });
        });
        let transport = self.peers.new_peer(sink).await?;

        if let Some(media) = &self.local_media {
            for track in media.tracks() {
                if let Err(e) = transport.add_track(track.clone()).await {
                    transport.detach();
                    let _ = transport.close().await;
                    return Err(e);
                }
            }
        }
        self.peer = Some(ActivePeer {
            generation,
            transport,
        });
        Ok(())
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    async fn on_channel_event(&mut self, generation: u64, event: ChannelEvent) {
        if self.channel.generation() != Some(generation) {
            log(&format!("Ignoring event from stale signaling connection {generation}"));
            return;
        }
        match event {
            ChannelEvent::Message(text) => self.on_message(&text).await,
            ChannelEvent::Closed => {
                log("WebSocket disconnected");
                self.teardown(EndReason::ChannelClosed).await;
            }
            ChannelEvent::Error(e) => {
                warn(&format!("WebSocket error: {e}"));
                self.teardown(EndReason::ChannelError).await;
            }
        }
    }

    async fn on_message(&mut self, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn(&format!("Invalid WebSocket message: {e}"));
                self.status.set_text("Invalid message received");
                return;
            }
        };
        log(&format!("Received {}", envelope.kind()));

        match self.negotiator.screen(&envelope) {
            Screening::Accept => {}
            Screening::Stale => {
                warn(&format!(
                    "Ignoring {} for callId {:?}. Current: {:?}",
                    envelope.kind(),
                    envelope.call_id.as_ref().map(CallId::as_str),
                    self.negotiator.call_id().map(CallId::as_str),
                ));
                return;
            }
            Screening::NoActiveCall => {
                warn(&format!("Ignoring {}: no active call", envelope.kind()));
                return;
            }
            Screening::Unscoped => {
                warn(&format!("Ignoring {} without callId", envelope.kind()));
                return;
            }
        }

        let kind = envelope.kind();
        let outcome = match envelope.signal {
            Signal::Offer(offer) => self.on_offer(offer).await,
            Signal::Answer(answer) => self.on_answer(answer).await,
            Signal::IceCandidate(candidate) => self.on_remote_candidate(candidate).await,
            Signal::CallJoined => {
                if self.negotiator.state() == NegotiationState::AwaitingOffer {
                    self.status.set_text("Joined call, waiting for offer");
                }
                Ok(())
            }
            Signal::PeerDisconnected => {
                self.teardown(EndReason::PeerDisconnected).await;
                Ok(())
            }
            Signal::Error(msg) => {
                warn(&format!("Signaling error: {msg}"));
                self.status.set_text(format!("Signaling error: {msg}"));
                Ok(())
            }
            Signal::JoinCall | Signal::Hangup => {
                warn(&format!("Ignoring client-only {kind} from relay"));
                Ok(())
            }
        };

        match outcome {
            Ok(()) => {}
            // Wrong state or role: dropped, the call carries on
            Err(CallError::Negotiation(e)) => warn(&format!("Dropping {kind}: {e}")),
            Err(e) => {
                warn(&format!("Error processing {kind}: {e}"));
                self.status.set_text(format!("Error: {e}"));
            }
        }
    }

    async fn on_offer(&mut self, offer: SessionDescription) -> Result<(), CallError> {
        self.negotiator.check_offer()?;
        self.open_peer().await?;
        let peer = self.peer.as_ref().ok_or(TransportError::Closed)?;

        log("Setting remote offer");
        peer.transport.set_remote_description(&offer).await?;
        self.negotiator.remote_offer_applied()?;

        // Past this point the remote offer is applied; an unanswered call
        // cannot recover, so any failure ends it.
        if let Err(e) = self.answer_offer().await {
            warn(&format!("Error answering offer: {e}"));
            self.teardown(EndReason::Failed(e.to_string())).await;
        }
        Ok(())
    }

    async fn answer_offer(&mut self) -> Result<(), CallError> {
        let peer = self.peer.as_ref().ok_or(TransportError::Closed)?;
        let answer = peer.transport.create_answer().await?;
        peer.transport.set_local_description(&answer).await?;
        let envelope = self.negotiator.answer_created(answer)?;
        log("Sending answer");
        if !self.channel.send(&envelope) {
            return Err(SignalingError::NotConnected.into());
        }
        self.status.set_text("Answered call");

        release_pending(self.negotiator.pending_mut(), peer.transport.as_ref()).await;
        Ok(())
    }

    async fn on_answer(&mut self, answer: SessionDescription) -> Result<(), CallError> {
        self.negotiator.check_answer()?;
        let peer = self.peer.as_ref().ok_or(TransportError::Closed)?;

        log("Setting remote answer");
        peer.transport.set_remote_description(&answer).await?;
        self.negotiator.answer_applied()?;
        self.status.set_text("Call connected");

        release_pending(self.negotiator.pending_mut(), peer.transport.as_ref()).await;
        Ok(())
    }

    async fn on_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), CallError> {
        dump_candidate("REMOTE", &candidate);
        match self.negotiator.route_candidate(candidate) {
            CandidateRoute::Apply(candidate) => {
                let peer = self.peer.as_ref().ok_or(TransportError::Closed)?;
                log("Adding ICE candidate");
                peer.transport.add_ice_candidate(candidate).await?;
            }
            CandidateRoute::Queued(pending) => {
                log(&format!(
                    "Queuing ICE candidate (no remote description yet), {pending} pending"
                ));
            }
        }
        Ok(())
    }

    async fn on_peer_event(&mut self, generation: u64, event: PeerEvent) {
        if self.peer.as_ref().map(|p| p.generation) != Some(generation) {
            log(&format!("Ignoring event from discarded peer connection {generation}"));
            return;
        }
        match event {
            PeerEvent::TrackReceived(track) => {
                self.remote_tracks.push(track);
                self.status.set_text("Remote stream received");
            }
            PeerEvent::CandidateDiscovered(candidate) => {
                if !self.channel.is_open() {
                    log("Local candidate not sent: signaling channel closed");
                    return;
                }
                if let Some(envelope) = self.negotiator.local_candidate(candidate) {
                    self.channel.send(&envelope);
                }
            }
            PeerEvent::GatheringComplete => log("ICE gathering complete"),
            PeerEvent::ConnectivityChanged(state) => {
                log(&format!("ICE connection state: {state:?}"));
                if state.is_lost() {
                    self.teardown(EndReason::ConnectivityLost).await;
                }
            }
            PeerEvent::SignalingChanged(state) => log(&format!("Signaling state: {state}")),
        }
    }

    /// Releases everything a call holds and returns to the initial state.
    /// Idempotent: with nothing held it only logs.
    async fn teardown(&mut self, reason: EndReason) {
        let mut released = false;

        if let Some(peer) = self.peer.take() {
            peer.transport.detach();
            if let Err(e) = peer.transport.close().await {
                warn(&format!("Closing peer connection failed: {e}"));
            }
            released = true;
        }
        if let Some(media) = self.local_media.take() {
            let stopped = media.stop_all();
            log(&format!("Stopped {stopped} local tracks"));
            released = true;
        }
        for track in self.remote_tracks.drain(..) {
            track.stop();
            released = true;
        }
        released |= self.channel.close();
        released |= self.negotiator.reset().is_some();

        if !released {
            log("Teardown: nothing to release");
            return;
        }
        log(&format!("Call state reset ({reason:?})"));
        self.status.reset(reason.status_text());
    }

    #[cfg(test)]
    pub(crate) async fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.dispatch(event).await;
        }
    }
}

async fn release_pending(queue: &mut CandidateQueue, transport: &dyn PeerTransport) {
    if queue.is_empty() {
        return;
    }
    let report = queue
        .drain_into(move |candidate| transport.add_ice_candidate(candidate))
        .await;
    log(&format!(
        "Released pending candidates: {} applied, {} failed",
        report.applied, report.failed
    ));
}

/// Cloneable front door to a spawned controller.
#[derive(Clone)]
pub struct CallHandle {
    events: mpsc::UnboundedSender<Event>,
    status: watch::Receiver<CallStatus>,
}

impl CallHandle {
    /// False once the controller has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.events.send(Event::Command(command)).is_ok()
    }

    pub fn acquire_media(&self) -> bool {
        self.send(Command::AcquireMedia)
    }

    pub fn start_call(&self) -> bool {
        self.send(Command::StartCall)
    }

    pub fn join_call(&self, call_id: impl Into<String>) -> bool {
        self.send(Command::JoinCall(call_id.into()))
    }

    pub fn hang_up(&self) -> bool {
        self.send(Command::HangUp)
    }

    /// Hangs up and stops the loop.
    pub fn shutdown(&self) {
        let _ = self.events.send(Event::Shutdown);
    }

    pub fn status(&self) -> watch::Receiver<CallStatus> {
        self.status.clone()
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (tx, rx) = oneshot::channel();
        self.events.send(Event::Inspect(tx)).ok()?;
        rx.await.ok()
    }
}
