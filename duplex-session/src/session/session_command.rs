use crate::error::SessionError;
use duplex_core::{ChatMessage, MessageKind};
use tokio::sync::oneshot;

pub(crate) enum SessionCommand {
    Send {
        kind: MessageKind,
        body: String,
        reply: oneshot::Sender<Result<Option<ChatMessage>, SessionError>>,
    },
    /// Tear the room down and start over as caller.
    Reconnect,
    Close { reply: oneshot::Sender<()> },
}
