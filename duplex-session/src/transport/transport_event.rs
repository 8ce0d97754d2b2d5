use bytes::Bytes;
use duplex_core::IceCandidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Everything a transport reports back to its session, in emission order.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    LocalCandidate(IceCandidate),
    ConnectionStateChanged(PeerConnectionState),
    DataChannelOpen,
    DataChannelClosed,
    Message(Bytes),
}
