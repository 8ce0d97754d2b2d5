mod chat_session;
mod inbound;
mod session_command;
mod session_event;

pub use chat_session::*;
pub(crate) use inbound::*;
pub(crate) use session_command::*;
pub use session_event::*;
