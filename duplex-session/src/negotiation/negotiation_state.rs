use std::fmt;

/// Phase of the offer/answer/candidate exchange for the current room generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum NegotiationState {
    #[default]
    Idle,
    RoleResolving,
    CallerOffering,
    AnswererAwaitingOffer,
    ExchangingCandidates,
    Connected,
    Renegotiating,
    Closed,
}

impl NegotiationState {
    pub fn is_closed(self) -> bool {
        self == NegotiationState::Closed
    }
}

impl fmt::Display for NegotiationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NegotiationState::Idle => "IDLE",
            NegotiationState::RoleResolving => "ROLE_RESOLVING",
            NegotiationState::CallerOffering => "CALLER_OFFERING",
            NegotiationState::AnswererAwaitingOffer => "ANSWERER_AWAITING_OFFER",
            NegotiationState::ExchangingCandidates => "EXCHANGING_CANDIDATES",
            NegotiationState::Connected => "CONNECTED",
            NegotiationState::Renegotiating => "RENEGOTIATING",
            NegotiationState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}
