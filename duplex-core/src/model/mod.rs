mod candidate;
mod conversation;
mod message;
mod peer;
mod room;

pub use candidate::{CandidateRecord, IceCandidate};
pub use conversation::{ConversationKey, ConversationSummary, StoredMessage};
pub use message::{ChatMessage, MessageKind, WireMessage};
pub use peer::{PAIR_SEPARATOR, PeerId, PeerProfile, pair_key};
pub use room::{RoomDocument, RoomId, RoomPatch, RoomStatus};
