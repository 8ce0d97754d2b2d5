use crate::error::TransportError;
use crate::transport::{TransportConfig, TransportEvent};
use async_trait::async_trait;
use bytes::Bytes;
use duplex_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

/// One direct connection to the peer. Callbacks (local candidates, state
/// changes, incoming data) arrive as [`TransportEvent`]s on the channel the
/// transport was created with.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// Creates an offer and installs it as the local description.
    async fn create_local_offer(&self) -> Result<String, TransportError>;

    /// Creates an answer to the applied remote offer and installs it locally.
    async fn create_local_answer(&self) -> Result<String, TransportError>;

    async fn set_remote_description(&self, kind: SdpKind, sdp: String)
    -> Result<(), TransportError>;

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError>;

    /// `false` when there is no open data channel to send on.
    async fn send_data(&self, data: Bytes) -> bool;

    async fn close(&self);
}

#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// `open_data_channel` is set on the calling side, which owns the channel.
    async fn create(
        &self,
        config: &TransportConfig,
        open_data_channel: bool,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError>;
}
