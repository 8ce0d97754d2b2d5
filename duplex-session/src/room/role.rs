use duplex_core::RoomId;
use std::fmt;

/// Which half of the offer/answer handshake a peer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Creates the data channel and publishes the offer.
    Caller,
    /// Waits for the offer and publishes the answer.
    Answerer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Caller => write!(f, "CALLER"),
            Role::Answerer => write!(f, "ANSWERER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAssignment {
    pub room_id: RoomId,
    pub role: Role,
}
