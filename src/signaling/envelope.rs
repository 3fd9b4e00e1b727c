//! Wire unit of the relay protocol: `{"type", "callId", "data"}` JSON text frames.

use crate::error::EnvelopeError;
use crate::peer::types::{IceCandidate, SdpKind, SessionDescription};
use crate::session::CallId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    Offer(SessionDescription),
    Answer(SessionDescription),
    IceCandidate(IceCandidate),
    JoinCall,
    Hangup,
    CallJoined,
    PeerDisconnected,
    Error(String),
}

impl Signal {
    pub fn kind(&self) -> &'static str {
        match self {
            Signal::Offer(_) => "offer",
            Signal::Answer(_) => "answer",
            Signal::IceCandidate(_) => "ice-candidate",
            Signal::JoinCall => "join_call",
            Signal::Hangup => "hangup",
            Signal::CallJoined => "call_joined",
            Signal::PeerDisconnected => "peer_disconnected",
            Signal::Error(_) => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub call_id: Option<CallId>,
    pub signal: Signal,
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(rename = "callId", default, skip_serializing_if = "Option::is_none")]
    call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl Envelope {
    pub fn new(call_id: CallId, signal: Signal) -> Self {
        Self {
            call_id: Some(call_id),
            signal,
        }
    }

    pub fn kind(&self) -> &'static str {
        self.signal.kind()
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        let data = match &self.signal {
            Signal::Offer(desc) | Signal::Answer(desc) => Some(serde_json::to_value(desc)?),
            Signal::IceCandidate(cand) => Some(serde_json::to_value(cand)?),
            Signal::Error(msg) => Some(Value::String(msg.clone())),
            Signal::JoinCall | Signal::Hangup | Signal::CallJoined | Signal::PeerDisconnected => {
                None
            }
        };
        serde_json::to_string(&WireEnvelope {
            kind: Some(self.kind().to_owned()),
            call_id: self.call_id.as_ref().map(|id| id.as_str().to_owned()),
            data,
        })
    }

    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let wire: WireEnvelope = serde_json::from_str(text)?;
        let kind = wire
            .kind
            .filter(|k| !k.is_empty())
            .ok_or(EnvelopeError::MissingType)?;
        // The relay writes `"callId": ""` on errors that belong to no call.
        let call_id = wire.call_id.as_deref().and_then(CallId::parse);
        let data = wire.data.filter(|v| !v.is_null());

        let signal = match kind.as_str() {
            "offer" => Signal::Offer(description(data, SdpKind::Offer)?),
            "answer" => Signal::Answer(description(data, SdpKind::Answer)?),
            "ice-candidate" => {
                let data = data.ok_or(EnvelopeError::MissingData("ice-candidate"))?;
                Signal::IceCandidate(serde_json::from_value(data)?)
            }
            "join_call" => Signal::JoinCall,
            "hangup" => Signal::Hangup,
            "call_joined" => Signal::CallJoined,
            "peer_disconnected" => Signal::PeerDisconnected,
            "error" => Signal::Error(match data {
                Some(Value::String(msg)) => msg,
                Some(other) => other.to_string(),
                None => "unknown error".to_owned(),
            }),
            _ => return Err(EnvelopeError::UnknownType(kind)),
        };

        Ok(Self { call_id, signal })
    }
}

fn description(data: Option<Value>, expected: SdpKind) -> Result<SessionDescription, EnvelopeError> {
    let data = data.ok_or(EnvelopeError::MissingData(expected.as_str()))?;
    let desc: SessionDescription = serde_json::from_value(data)?;
    if desc.kind != expected {
        return Err(EnvelopeError::DescriptionMismatch {
            expected: expected.as_str(),
            got: desc.kind.as_str(),
        });
    }
    Ok(desc)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> CallId {
        CallId::parse(raw).unwrap()
    }

    #[test]
    fn offer_encodes_in_relay_shape() {
        let env = Envelope::new(id("call_1"), Signal::Offer(SessionDescription::offer("v=0")));
        let json: Value = serde_json::from_str(&env.encode().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "offer",
                "callId": "call_1",
                "data": {"type": "offer", "sdp": "v=0"}
            })
        );
    }

    #[test]
    fn payload_free_types_omit_data() {
        let env = Envelope::new(id("call_1"), Signal::JoinCall);
        assert_eq!(env.encode().unwrap(), r#"{"type":"join_call","callId":"call_1"}"#);
    }

    #[test]
    fn relay_error_without_call_is_unscoped() {
        let env = Envelope::decode(r#"{"type":"error","callId":"","data":"Room is full"}"#).unwrap();
        assert_eq!(env.call_id, None);
        assert_eq!(env.signal, Signal::Error("Room is full".into()));
    }

    #[test]
    fn peer_disconnected_from_relay() {
        let env = Envelope::decode(r#"{"type":"peer_disconnected","callId":"call_9"}"#).unwrap();
        assert_eq!(env.call_id, Some(id("call_9")));
        assert_eq!(env.signal, Signal::PeerDisconnected);
    }

    #[test]
    fn browser_candidate_is_decoded() {
        let env = Envelope::decode(
            r#"{"type":"ice-candidate","callId":"c","data":{"candidate":"candidate:1 1 udp 1 10.0.0.1 9 typ host","sdpMid":"0","sdpMLineIndex":0}}"#,
        )
        .unwrap();
        match env.signal {
            Signal::IceCandidate(c) => assert_eq!(c.sdp_mline_index, Some(0)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_input_is_classified() {
        assert!(matches!(Envelope::decode("not json"), Err(EnvelopeError::Json(_))));
        assert!(matches!(
            Envelope::decode(r#"{"callId":"c"}"#),
            Err(EnvelopeError::MissingType)
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"","callId":"c"}"#),
            Err(EnvelopeError::MissingType)
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"renegotiate","callId":"c"}"#),
            Err(EnvelopeError::UnknownType(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"offer","callId":"c"}"#),
            Err(EnvelopeError::MissingData("offer"))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"answer","callId":"c","data":{"type":"offer","sdp":"x"}}"#),
            Err(EnvelopeError::DescriptionMismatch { .. })
        ));
    }
}
