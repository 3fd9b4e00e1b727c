pub mod channel;
pub mod envelope;
pub mod websocket;

pub use channel::{ChannelEvent, ChannelEventSink, Dialer, Link, SignalingChannel};
pub use envelope::{Envelope, Signal};
pub use websocket::WsDialer;
