//! Offer/answer state machine for one two-party call.
//!
//! The negotiator never touches the network or the peer connection. It decides
//! whether a step is allowed, records the transition once the controller has
//! performed the transport work, and produces the envelopes to send.

use crate::error::NegotiationError;
use crate::logger::{log, warn};
use crate::peer::ice::CandidateQueue;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::session::{Call, CallId, CallPhase, InitiatorPhase, NegotiationState, ResponderPhase, Role};
use crate::signaling::envelope::{Envelope, Signal};

/// Verdict on an inbound envelope's call id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screening {
    Accept,
    /// Belongs to another call
    Stale,
    /// Call-scoped, but no call is live
    NoActiveCall,
    /// No call id and not a relay-level error
    Unscoped,
}

/// Where a remote candidate went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateRoute {
    /// Remote description is in place; apply it now.
    Apply(IceCandidate),
    /// Held back; the queue now has this many.
    Queued(usize),
}

#[derive(Debug, Default)]
pub struct Negotiator {
    call: Option<Call>,
    pending: CandidateQueue,
}

impl Negotiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call(&self) -> Option<&Call> {
        self.call.as_ref()
    }

    pub fn call_id(&self) -> Option<&CallId> {
        self.call.as_ref().map(Call::id)
    }

    pub fn role(&self) -> Option<Role> {
        self.call.as_ref().map(Call::role)
    }

    pub fn state(&self) -> NegotiationState {
        self.call
            .as_ref()
            .map_or(NegotiationState::Idle, Call::state)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_mut(&mut self) -> &mut CandidateQueue {
        &mut self.pending
    }

    pub fn check_start(&self) -> Result<(), NegotiationError> {
        match self.call {
            Some(_) => Err(NegotiationError::CallActive),
            None => Ok(()),
        }
    }

    /// Idle -> IntendingOffer under a fresh id.
    pub fn start_as_initiator(&mut self) -> Result<CallId, NegotiationError> {
        self.check_start()?;
        let id = CallId::generate();
        log(&format!("Starting call {id} as initiator"));
        self.call = Some(Call::initiator(id.clone()));
        Ok(id)
    }

    /// IntendingOffer -> HaveLocalOffer; returns the `offer` envelope.
    pub fn offer_created(&mut self, offer: SessionDescription) -> Result<Envelope, NegotiationError> {
        let call = self.expect_phase(
            "local offer",
            CallPhase::Initiator(InitiatorPhase::IntendingOffer),
        )?;
        call.phase = CallPhase::Initiator(InitiatorPhase::HaveLocalOffer);
        Ok(Envelope::new(call.id().clone(), Signal::Offer(offer)))
    }

    pub fn check_join(&self, id: &CallId) -> Result<(), NegotiationError> {
        match &self.call {
            None => Ok(()),
            Some(call) if call.role() == Role::Responder && call.id() == id => {
                Err(NegotiationError::AlreadyJoined)
            }
            Some(_) => Err(NegotiationError::CallActive),
        }
    }

    /// Idle -> AwaitingOffer; returns the `join_call` envelope.
    pub fn join_as_responder(&mut self, id: CallId) -> Result<Envelope, NegotiationError> {
        self.check_join(&id)?;
        log(&format!("Joining call {id} as responder"));
        self.call = Some(Call::responder(id.clone()));
        Ok(Envelope::new(id, Signal::JoinCall))
    }

    /// Call-id fencing for inbound traffic.
    pub fn screen(&self, envelope: &Envelope) -> Screening {
        let Some(id) = &envelope.call_id else {
            return match envelope.signal {
                Signal::Error(_) => Screening::Accept,
                _ => Screening::Unscoped,
            };
        };
        match &self.call {
            None => Screening::NoActiveCall,
            Some(call) if call.id() == id => Screening::Accept,
            Some(_) => Screening::Stale,
        }
    }

    /// Offers are taken by a responder that is waiting for one, or that is
    /// already stable (renegotiation on the same connection).
    pub fn check_offer(&self) -> Result<(), NegotiationError> {
        let call = self.call.as_ref().ok_or(NegotiationError::NoActiveCall)?;
        match call.phase {
            CallPhase::Responder(ResponderPhase::AwaitingOffer | ResponderPhase::Stable) => Ok(()),
            _ => Err(NegotiationError::Unexpected {
                signal: "offer",
                state: call.state(),
            }),
        }
    }

    pub fn remote_offer_applied(&mut self) -> Result<(), NegotiationError> {
        self.check_offer()?;
        if let Some(call) = self.call.as_mut() {
            call.phase = CallPhase::Responder(ResponderPhase::HaveRemoteOffer);
        }
        Ok(())
    }

    /// HaveRemoteOffer -> Stable; returns the `answer` envelope.
    pub fn answer_created(&mut self, answer: SessionDescription) -> Result<Envelope, NegotiationError> {
        let call = self.expect_phase(
            "local answer",
            CallPhase::Responder(ResponderPhase::HaveRemoteOffer),
        )?;
        call.phase = CallPhase::Responder(ResponderPhase::Stable);
        Ok(Envelope::new(call.id().clone(), Signal::Answer(answer)))
    }

    /// Answers are only for an initiator with an unanswered offer.
    pub fn check_answer(&self) -> Result<(), NegotiationError> {
        let call = self.call.as_ref().ok_or(NegotiationError::NoActiveCall)?;
        match call.phase {
            CallPhase::Initiator(InitiatorPhase::HaveLocalOffer) => Ok(()),
            _ => Err(NegotiationError::Unexpected {
                signal: "answer",
                state: call.state(),
            }),
        }
    }

    pub fn answer_applied(&mut self) -> Result<(), NegotiationError> {
        let call = self.expect_phase(
            "answer",
            CallPhase::Initiator(InitiatorPhase::HaveLocalOffer),
        )?;
        call.phase = CallPhase::Initiator(InitiatorPhase::Stable);
        Ok(())
    }

    pub fn route_candidate(&mut self, candidate: IceCandidate) -> CandidateRoute {
        if self.call.as_ref().is_some_and(Call::has_remote_description) {
            CandidateRoute::Apply(candidate)
        } else {
            self.pending.enqueue(candidate);
            CandidateRoute::Queued(self.pending.len())
        }
    }

    /// `ice-candidate` envelope for a locally gathered candidate, if a call is live.
    pub fn local_candidate(&self, candidate: IceCandidate) -> Option<Envelope> {
        self.call
            .as_ref()
            .map(|call| Envelope::new(call.id().clone(), Signal::IceCandidate(candidate)))
    }

    /// Back to Idle. Queued candidates are dropped, not applied.
    pub fn reset(&mut self) -> Option<Call> {
        let dropped = self.pending.discard();
        if dropped > 0 {
            log(&format!("Discarded {dropped} pending candidates"));
        }
        self.call.take()
    }

    fn expect_phase(
        &mut self,
        signal: &'static str,
        phase: CallPhase,
    ) -> Result<&mut Call, NegotiationError> {
        let call = self.call.as_mut().ok_or(NegotiationError::NoActiveCall)?;
        if call.phase != phase {
            let state = call.state();
            warn(&format!("Unexpected {signal} in state {state:?}"));
            return Err(NegotiationError::Unexpected { signal, state });
        }
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(n: u16) -> IceCandidate {
        IceCandidate {
            candidate: format!("candidate:{n} 1 udp 1 10.0.0.{n} 9 typ host"),
            sdp_mid: Some("0".into()),
            sdp_mline_index: Some(0),
            username_fragment: None,
        }
    }

    fn joined(id: &str) -> Negotiator {
        let mut n = Negotiator::new();
        n.join_as_responder(CallId::parse(id).unwrap()).unwrap();
        n
    }

    #[test]
    fn initiator_walks_to_stable() {
        let mut n = Negotiator::new();
        let id = n.start_as_initiator().unwrap();
        assert_eq!(n.state(), NegotiationState::IntendingOffer);

        let env = n.offer_created(SessionDescription::offer("S1")).unwrap();
        assert_eq!(env.call_id.as_ref(), Some(&id));
        assert_eq!(env.signal, Signal::Offer(SessionDescription::offer("S1")));
        assert_eq!(n.state(), NegotiationState::HaveLocalOffer);

        n.check_answer().unwrap();
        n.answer_applied().unwrap();
        assert_eq!(n.state(), NegotiationState::Stable);
    }

    #[test]
    fn second_start_is_rejected() {
        let mut n = Negotiator::new();
        n.start_as_initiator().unwrap();
        assert_eq!(n.start_as_initiator(), Err(NegotiationError::CallActive));
    }

    #[test]
    fn responder_ignores_answers() {
        let mut n = joined("c1");
        assert!(matches!(
            n.check_answer(),
            Err(NegotiationError::Unexpected { signal: "answer", state: NegotiationState::AwaitingOffer })
        ));
        assert!(n.answer_applied().is_err());
        assert_eq!(n.state(), NegotiationState::AwaitingOffer);
    }

    #[test]
    fn initiator_ignores_offers() {
        let mut n = Negotiator::new();
        n.start_as_initiator().unwrap();
        n.offer_created(SessionDescription::offer("S1")).unwrap();
        assert!(n.check_offer().is_err());
        assert!(n.remote_offer_applied().is_err());
        assert_eq!(n.state(), NegotiationState::HaveLocalOffer);
    }

    #[test]
    fn answer_in_stable_is_dropped() {
        let mut n = Negotiator::new();
        n.start_as_initiator().unwrap();
        n.offer_created(SessionDescription::offer("S1")).unwrap();
        n.answer_applied().unwrap();
        assert!(n.check_answer().is_err());
        assert_eq!(n.state(), NegotiationState::Stable);
    }

    #[test]
    fn double_join_is_suppressed() {
        let mut n = joined("c1");
        assert_eq!(
            n.join_as_responder(CallId::parse(" c1 ").unwrap()),
            Err(NegotiationError::AlreadyJoined)
        );
        assert_eq!(
            n.join_as_responder(CallId::parse("c2").unwrap()),
            Err(NegotiationError::CallActive)
        );
        assert_eq!(n.call_id().map(CallId::as_str), Some("c1"));
    }

    #[test]
    fn envelopes_are_fenced_by_call_id() {
        let idle = Negotiator::new();
        let other = Envelope::new(CallId::parse("c2").unwrap(), Signal::Hangup);
        assert_eq!(idle.screen(&other), Screening::NoActiveCall);

        let n = joined("c1");
        assert_eq!(n.screen(&other), Screening::Stale);
        let mine = Envelope::new(CallId::parse("c1").unwrap(), Signal::CallJoined);
        assert_eq!(n.screen(&mine), Screening::Accept);

        let relay_error = Envelope {
            call_id: None,
            signal: Signal::Error("boom".into()),
        };
        assert_eq!(n.screen(&relay_error), Screening::Accept);
        let unscoped = Envelope {
            call_id: None,
            signal: Signal::PeerDisconnected,
        };
        assert_eq!(n.screen(&unscoped), Screening::Unscoped);
    }

    #[test]
    fn candidates_queue_until_remote_offer() {
        let mut n = joined("c1");
        assert_eq!(n.route_candidate(cand(1)), CandidateRoute::Queued(1));
        assert_eq!(n.route_candidate(cand(2)), CandidateRoute::Queued(2));

        n.remote_offer_applied().unwrap();
        assert_eq!(n.route_candidate(cand(3)), CandidateRoute::Apply(cand(3)));
        assert_eq!(n.pending_len(), 2);
    }

    #[test]
    fn responder_accepts_a_renegotiation_offer() {
        let mut n = joined("c1");
        n.remote_offer_applied().unwrap();
        n.answer_created(SessionDescription::answer("A1")).unwrap();
        assert_eq!(n.state(), NegotiationState::Stable);

        n.check_offer().unwrap();
        n.remote_offer_applied().unwrap();
        let env = n.answer_created(SessionDescription::answer("A2")).unwrap();
        assert_eq!(env.signal, Signal::Answer(SessionDescription::answer("A2")));
        assert_eq!(n.state(), NegotiationState::Stable);
    }

    #[test]
    fn reset_discards_queue_and_call() {
        let mut n = joined("c1");
        n.route_candidate(cand(1));
        assert!(n.reset().is_some());
        assert_eq!(n.state(), NegotiationState::Idle);
        assert_eq!(n.pending_len(), 0);
        assert!(n.reset().is_none());
        assert!(n.local_candidate(cand(2)).is_none());
    }
}
