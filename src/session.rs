use crate::utils::random_id;
use std::fmt;

/// Opaque call identifier shared by both parties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallId(String);

impl CallId {
    /// Fresh id for an initiator, `call_<hex>`.
    pub fn generate() -> Self {
        CallId(format!("call_{}", random_id()))
    }

    /// Trims user input; `None` when nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| CallId(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Observable negotiation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    /// Initiator, offer being created
    IntendingOffer,
    /// Initiator, offer sent and unanswered
    HaveLocalOffer,
    /// Responder, `join_call` sent
    AwaitingOffer,
    /// Responder, remote offer applied, answer not yet sent
    HaveRemoteOffer,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiatorPhase {
    IntendingOffer,
    HaveLocalOffer,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponderPhase {
    AwaitingOffer,
    HaveRemoteOffer,
    Stable,
}

/// Role and phase in one value; a role cannot carry the other role's phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Initiator(InitiatorPhase),
    Responder(ResponderPhase),
}

/// One negotiation session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    id: CallId,
    pub(crate) phase: CallPhase,
}

impl Call {
    pub(crate) fn initiator(id: CallId) -> Self {
        Self {
            id,
            phase: CallPhase::Initiator(InitiatorPhase::IntendingOffer),
        }
    }

    pub(crate) fn responder(id: CallId) -> Self {
        Self {
            id,
            phase: CallPhase::Responder(ResponderPhase::AwaitingOffer),
        }
    }

    pub fn id(&self) -> &CallId {
        &self.id
    }

    pub fn role(&self) -> Role {
        match self.phase {
            CallPhase::Initiator(_) => Role::Initiator,
            CallPhase::Responder(_) => Role::Responder,
        }
    }

    pub fn state(&self) -> NegotiationState {
        match self.phase {
            CallPhase::Initiator(InitiatorPhase::IntendingOffer) => NegotiationState::IntendingOffer,
            CallPhase::Initiator(InitiatorPhase::HaveLocalOffer) => NegotiationState::HaveLocalOffer,
            CallPhase::Responder(ResponderPhase::AwaitingOffer) => NegotiationState::AwaitingOffer,
            CallPhase::Responder(ResponderPhase::HaveRemoteOffer) => {
                NegotiationState::HaveRemoteOffer
            }
            CallPhase::Initiator(InitiatorPhase::Stable)
            | CallPhase::Responder(ResponderPhase::Stable) => NegotiationState::Stable,
        }
    }

    /// Whether a remote description has been applied on this call.
    pub fn has_remote_description(&self) -> bool {
        matches!(
            self.phase,
            CallPhase::Initiator(InitiatorPhase::Stable)
                | CallPhase::Responder(ResponderPhase::HaveRemoteOffer | ResponderPhase::Stable)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_ids_are_trimmed_and_non_empty() {
        assert_eq!(CallId::parse("  call_ab12 ").unwrap().as_str(), "call_ab12");
        assert!(CallId::parse("   ").is_none());
        assert!(CallId::parse("").is_none());
    }

    #[test]
    fn generated_ids_are_distinct() {
        let a = CallId::generate();
        let b = CallId::generate();
        assert!(a.as_str().starts_with("call_"));
        assert_ne!(a, b);
    }

    #[test]
    fn fresh_calls_start_in_their_role_entry_state() {
        let id = CallId::parse("c1").unwrap();
        let caller = Call::initiator(id.clone());
        assert_eq!(caller.role(), Role::Initiator);
        assert_eq!(caller.state(), NegotiationState::IntendingOffer);
        assert!(!caller.has_remote_description());

        let callee = Call::responder(id);
        assert_eq!(callee.role(), Role::Responder);
        assert_eq!(callee.state(), NegotiationState::AwaitingOffer);
    }
}
