mod config;
mod error;
mod messaging;
mod negotiation;
mod room;
mod session;
mod signaling;
mod transport;

pub use config::*;
pub use error::*;
pub use messaging::*;
pub use negotiation::*;
pub use room::*;
pub use session::*;
pub use signaling::*;
pub use transport::*;
