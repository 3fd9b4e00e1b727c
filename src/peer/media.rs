//! Local and remote media tracks.
//!
//! Capture and rendering live outside this crate; a [`MediaSource`] hands over
//! outbound tracks, the peer connection reports inbound ones.

use crate::error::MediaError;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8};
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_local::TrackLocal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

/// Outbound track handed to the peer connection.
pub struct LocalTrack {
    kind: TrackKind,
    rtc: Arc<TrackLocalStaticSample>,
    live: AtomicBool,
}

impl LocalTrack {
    pub fn new(kind: TrackKind, id: &str, stream_id: &str) -> Self {
        let codec = match kind {
            TrackKind::Audio => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_OPUS.to_owned(),
                clock_rate: 48000,
                channels: 2,
                sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                ..Default::default()
            },
            TrackKind::Video => RTCRtpCodecCapability {
                mime_type: MIME_TYPE_VP8.to_owned(),
                clock_rate: 90000,
                ..Default::default()
            },
        };
        Self {
            kind,
            rtc: Arc::new(TrackLocalStaticSample::new(
                codec,
                id.to_owned(),
                stream_id.to_owned(),
            )),
            live: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        self.rtc.id()
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Returns true if this call actually ended the track.
    pub fn stop(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }

    pub fn rtc_track(&self) -> Arc<dyn TrackLocal + Send + Sync> {
        self.rtc.clone()
    }
}

/// Inbound track reported by the peer connection.
#[derive(Debug)]
pub struct RemoteTrack {
    id: String,
    kind: TrackKind,
    live: AtomicBool,
}

impl RemoteTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            live: AtomicBool::new(true),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    pub fn stop(&self) -> bool {
        self.live.swap(false, Ordering::AcqRel)
    }
}

/// The local stream: every outbound track of one acquisition.
#[derive(Default)]
pub struct LocalMedia {
    tracks: Vec<Arc<LocalTrack>>,
}

impl LocalMedia {
    pub fn new(tracks: Vec<Arc<LocalTrack>>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Arc<LocalTrack>] {
        &self.tracks
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|t| t.is_live())
    }

    /// Stops the tracks that are still live; returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire_local_media(&self) -> Result<LocalMedia, MediaError>;
}

/// Audio + video tracks with no capture device behind them; used by the
/// console client where nothing renders or records.
pub struct SyntheticMedia {
    stream_id: String,
}

impl SyntheticMedia {
    pub fn new(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
        }
    }
}

#[async_trait]
impl MediaSource for SyntheticMedia {
    async fn acquire_local_media(&self) -> Result<LocalMedia, MediaError> {
        Ok(LocalMedia::new(vec![
            Arc::new(LocalTrack::new(TrackKind::Audio, "audio", &self.stream_id)),
            Arc::new(LocalTrack::new(TrackKind::Video, "video", &self.stream_id)),
        ]))
    }
}
