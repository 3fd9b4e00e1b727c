pub mod connection;
pub mod ice;
pub mod media;
pub mod types;

pub use connection::{
    Connectivity, PeerEvent, PeerEventSink, PeerFactory, PeerTransport, RtcPeerFactory,
};
pub use ice::{CandidateQueue, DrainReport};
pub use media::{LocalMedia, LocalTrack, MediaSource, RemoteTrack, SyntheticMedia, TrackKind};
pub use types::{IceCandidate, SdpKind, ServerConfig, SessionDescription};
