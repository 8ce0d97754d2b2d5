use crate::error::SessionError;
use crate::negotiation::NegotiationState;
use crate::room::{ConnectionStatus, Role};
use crate::transport::PeerConnectionState;
use duplex_core::ChatMessage;

/// Notification stream of a [`crate::ChatSession`]. Errors are reported
/// here and never end the session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    RoleResolved(Role),
    StateChanged(NegotiationState),
    StatusChanged(ConnectionStatus),
    /// Raw transport state. Informational only, never acted upon.
    TransportState(PeerConnectionState),
    MessageAppended(ChatMessage),
    /// The peer left; the room is being rebuilt with this side as caller.
    Renegotiating,
    Error(SessionError),
    Closed,
}
