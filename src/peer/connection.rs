use crate::error::TransportError;
use crate::logger::{dump_candidate, log};
use crate::peer::media::{LocalTrack, RemoteTrack, TrackKind};
use crate::peer::types::{IceCandidate, ServerConfig, SessionDescription};
use crate::utils::add_ice_url_scheme;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_candidate::RTCIceCandidate;
use webrtc::ice_transport::ice_connection_state::RTCIceConnectionState;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::policy::bundle_policy::RTCBundlePolicy;
use webrtc::peer_connection::policy::rtcp_mux_policy::RTCRtcpMuxPolicy;
use webrtc::peer_connection::signaling_state::RTCSignalingState;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_remote::TrackRemote;

/// ICE connectivity as reported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    New,
    Checking,
    Connected,
    Completed,
    Disconnected,
    Failed,
    Closed,
}

impl Connectivity {
    /// Disconnected and failed both end the call.
    pub fn is_lost(self) -> bool {
        matches!(self, Connectivity::Disconnected | Connectivity::Failed)
    }
}

impl From<RTCIceConnectionState> for Connectivity {
    fn from(state: RTCIceConnectionState) -> Self {
        match state {
            RTCIceConnectionState::Checking => Connectivity::Checking,
            RTCIceConnectionState::Connected => Connectivity::Connected,
            RTCIceConnectionState::Completed => Connectivity::Completed,
            RTCIceConnectionState::Disconnected => Connectivity::Disconnected,
            RTCIceConnectionState::Failed => Connectivity::Failed,
            RTCIceConnectionState::Closed => Connectivity::Closed,
            _ => Connectivity::New,
        }
    }
}

/// Callbacks of a peer connection, turned into values.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    TrackReceived(Arc<RemoteTrack>),
    CandidateDiscovered(IceCandidate),
    GatheringComplete,
    ConnectivityChanged(Connectivity),
    SignalingChanged(String),
}

/// Where a peer connection delivers its events.
pub type PeerEventSink = Arc<dyn Fn(PeerEvent) + Send + Sync>;

/// Transport primitives of one peer connection (the connection handle).
#[async_trait]
pub trait PeerTransport: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError>;
    async fn create_answer(&self) -> Result<SessionDescription, TransportError>;
    async fn set_local_description(&self, desc: &SessionDescription)
        -> Result<(), TransportError>;
    async fn set_remote_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;
    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<(), TransportError>;
    /// Stops event delivery; nothing reaches the sink afterwards.
    fn detach(&self);
    async fn close(&self) -> Result<(), TransportError>;
}

/// Creates a fresh peer connection per call attempt.
#[async_trait]
pub trait PeerFactory: Send + Sync {
    async fn new_peer(&self, events: PeerEventSink)
        -> Result<Box<dyn PeerTransport>, TransportError>;
}

/// webrtc-rs backed factory
pub struct RtcPeerFactory {
    ice_servers: Vec<ServerConfig>,
}

impl RtcPeerFactory {
    pub fn new(ice_servers: Vec<ServerConfig>) -> Self {
        Self { ice_servers }
    }
}

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn new_peer(
        &self,
        events: PeerEventSink,
    ) -> Result<Box<dyn PeerTransport>, TransportError> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;
        let mut registry = Registry::new();
        registry = register_default_interceptors(registry, &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let pc = Arc::new(api.new_peer_connection(rtc_config(&self.ice_servers)).await?);
        let detached = Arc::new(AtomicBool::new(false));
        attach_handlers(&pc, events, detached.clone());
        log("Peer connection created");

        Ok(Box::new(RtcPeer { pc, detached }))
    }
}

/// Peer connection configuration
fn rtc_config(servers: &[ServerConfig]) -> RTCConfiguration {
    RTCConfiguration {
        ice_servers: get_user_ice_servers(servers),
        ice_candidate_pool_size: 10,
        bundle_policy: RTCBundlePolicy::MaxBundle,
        rtcp_mux_policy: RTCRtcpMuxPolicy::Require,
        ..Default::default()
    }
}

pub fn get_user_ice_servers(servers: &[ServerConfig]) -> Vec<RTCIceServer> {
    servers
        .iter()
        .map(|config| RTCIceServer {
            urls: vec![add_ice_url_scheme(config)],
            username: config.username.clone().unwrap_or_default(),
            credential: config.credential.clone().unwrap_or_default(),
        })
        .collect()
}

fn track_kind(kind: RTPCodecType) -> TrackKind {
    match kind {
        RTPCodecType::Audio => TrackKind::Audio,
        _ => TrackKind::Video,
    }
}

fn attach_handlers(pc: &RTCPeerConnection, events: PeerEventSink, detached: Arc<AtomicBool>) {
    let emit = move |event: PeerEvent| {
        if !detached.load(Ordering::Acquire) {
            events(event);
        }
    };
    let emit = Arc::new(emit);

    let on_track = emit.clone();
    pc.on_track(Box::new(move |track: Arc<TrackRemote>, _, _| {
        let kind = track_kind(track.kind());
        log(&format!("Received remote track: {:?} {}", kind, track.id()));
        on_track(PeerEvent::TrackReceived(Arc::new(RemoteTrack::new(
            track.id(),
            kind,
        ))));
        Box::pin(async {})
    }));

    let on_candidate = emit.clone();
    pc.on_ice_candidate(Box::new(move |cand: Option<RTCIceCandidate>| {
        match cand {
            Some(c) => match c.to_json() {
                Ok(init) => {
                    let candidate = IceCandidate::from(init);
                    dump_candidate("LOCAL", &candidate);
                    on_candidate(PeerEvent::CandidateDiscovered(candidate));
                }
                Err(e) => log(&format!("Failed to serialize local candidate: {e}")),
            },
            // None marks the end of gathering
            None => on_candidate(PeerEvent::GatheringComplete),
        }
        Box::pin(async {})
    }));

    let on_ice_state = emit.clone();
    pc.on_ice_connection_state_change(Box::new(move |state: RTCIceConnectionState| {
        log(&format!("ICE connection state: {state}"));
        on_ice_state(PeerEvent::ConnectivityChanged(state.into()));
        Box::pin(async {})
    }));

    let on_signaling = emit;
    pc.on_signaling_state_change(Box::new(move |state: RTCSignalingState| {
        on_signaling(PeerEvent::SignalingChanged(state.to_string()));
        Box::pin(async {})
    }));
}

pub struct RtcPeer {
    pc: Arc<RTCPeerConnection>,
    detached: Arc<AtomicBool>,
}

#[async_trait]
impl PeerTransport for RtcPeer {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        let offer = self.pc.create_offer(None).await?;
        SessionDescription::from_rtc(&offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        let answer = self.pc.create_answer(None).await?;
        SessionDescription::from_rtc(&answer)
    }

    async fn set_local_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc.set_local_description(desc.to_rtc()?).await?;
        Ok(())
    }

    async fn set_remote_description(
        &self,
        desc: &SessionDescription,
    ) -> Result<(), TransportError> {
        self.pc.set_remote_description(desc.to_rtc()?).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.pc.add_ice_candidate(candidate.into()).await?;
        Ok(())
    }

    async fn add_track(&self, track: Arc<LocalTrack>) -> Result<(), TransportError> {
        self.pc.add_track(track.rtc_track()).await?;
        log(&format!("Added local track: {:?}", track.kind()));
        Ok(())
    }

    fn detach(&self) {
        self.detached.store(true, Ordering::Release);
        self.pc.on_track(Box::new(|_, _, _| Box::pin(async {})));
        self.pc.on_ice_candidate(Box::new(|_| Box::pin(async {})));
        self.pc
            .on_ice_connection_state_change(Box::new(|_| Box::pin(async {})));
        self.pc.on_signaling_state_change(Box::new(|_| Box::pin(async {})));
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.pc.close().await?;
        Ok(())
    }
}
