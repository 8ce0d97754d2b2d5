pub use duplex_core::model::{PeerId, PeerProfile, RoomId};

pub mod model {
    pub use duplex_core::model::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use duplex_session::*;
}
