//! Error types for the call client

use crate::session::NegotiationState;
use thiserror::Error;

/// Malformed inbound wire data
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Payload is not JSON or has the wrong shape
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No `type` field
    #[error("Message missing type field")]
    MissingType,

    /// `type` is not part of the protocol
    #[error("Unknown message type: {0}")]
    UnknownType(String),

    /// `data` absent for a type that needs it
    #[error("Missing data for {0}")]
    MissingData(&'static str),

    /// Session description type disagrees with the envelope type
    #[error("Expected {expected} description, got {got}")]
    DescriptionMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

/// Errors from the signaling channel
#[derive(Error, Debug)]
pub enum SignalingError {
    /// Dial or handshake failed
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Channel is not open
    #[error("WebSocket not connected")]
    NotConnected,
}

/// Errors from the transport layer (peer connection)
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("WebRTC error: {0}")]
    Rtc(#[from] webrtc::Error),

    /// Description of a type the call flow cannot use (pranswer, rollback)
    #[error("Unsupported session description: {0}")]
    UnsupportedDescription(String),

    #[error("Peer connection closed")]
    Closed,
}

/// Errors from the media-acquisition collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Media access denied: {0}")]
    AccessDenied(String),
}

/// Protocol-state violations and rejected user intents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("A call is already active")]
    CallActive,

    #[error("Already joined call")]
    AlreadyJoined,

    #[error("Please enter a Call ID")]
    MissingCallId,

    #[error("No active call")]
    NoActiveCall,

    /// Message valid in form but not for the current state or role
    #[error("Unexpected {signal} in state {state:?}")]
    Unexpected {
        signal: &'static str,
        state: NegotiationState,
    },
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid origin: {0}")]
    Origin(String),

    #[error("Invalid ICE server: {0}")]
    IceServer(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a user intent or inbound-message step inside the controller
#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Errors that stop the client before or while running
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
