use crate::transport::TransportEvent;
use duplex_core::{CandidateRecord, RoomDocument};

/// Everything that reaches the session actor from outside its own call
/// stack. Feeds tag their items so the actor can drop those of a torn-down
/// room generation (`generation`) or transport (`epoch`).
#[derive(Debug)]
pub(crate) enum Inbound {
    Room {
        generation: u64,
        doc: Option<RoomDocument>,
    },
    RemoteCandidate {
        epoch: u64,
        record: CandidateRecord,
    },
    Transport {
        epoch: u64,
        event: TransportEvent,
    },
}
