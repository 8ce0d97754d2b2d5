use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};

use duplex_core::{PeerProfile, RoomDocument, RoomId};
use duplex_session::{
    ChatSession, InMemoryPersistence, InMemorySignalingStore, LoopbackNetwork,
    LoopbackTransportFactory, MessagePersistence, PeerTransport, SessionBackends, SessionConfig,
    SessionEvent, SignalingChannel, TransportConfig, TransportError, TransportEvent,
    TransportFactory,
};

/// Shared backends two peers rendezvous through: one document store, one
/// loopback network and one history store.
#[derive(Clone)]
pub struct TestWorld {
    pub store: Arc<InMemorySignalingStore>,
    pub network: Arc<LoopbackNetwork>,
    pub persistence: Arc<InMemoryPersistence>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemorySignalingStore::new()),
            network: LoopbackNetwork::new(),
            persistence: Arc::new(InMemoryPersistence::new()),
        }
    }

    pub fn backends(&self) -> SessionBackends {
        let persistence: Arc<dyn MessagePersistence> = self.persistence.clone();
        SessionBackends {
            signaling: self.store.clone(),
            transports: Arc::new(LoopbackTransportFactory::new(self.network.clone())),
            persistence,
        }
    }

    /// Opens a session for `local` chatting with `remote`.
    pub fn open(&self, local: &PeerProfile, remote: &PeerProfile) -> TestPeer {
        self.open_with(local, remote, self.backends())
    }

    pub fn open_with(
        &self,
        local: &PeerProfile,
        remote: &PeerProfile,
        backends: SessionBackends,
    ) -> TestPeer {
        let (session, events) =
            ChatSession::open(SessionConfig::default(), local.clone(), remote.clone(), backends);
        TestPeer { session, events }
    }

    pub async fn room(&self, room_id: &RoomId) -> Option<RoomDocument> {
        self.store.get(room_id).await.expect("store read failed")
    }
}

/// Loopback factory that keeps the event sender of every transport it
/// creates, so a test can inject transport callbacks.
pub struct TappedTransportFactory {
    inner: LoopbackTransportFactory,
    taps: Mutex<Vec<mpsc::Sender<TransportEvent>>>,
}

impl TappedTransportFactory {
    pub fn new(network: Arc<LoopbackNetwork>) -> Arc<Self> {
        Arc::new(Self {
            inner: LoopbackTransportFactory::new(network),
            taps: Mutex::new(Vec::new()),
        })
    }

    /// Event sender of the most recently created transport.
    pub fn latest(&self) -> Option<mpsc::Sender<TransportEvent>> {
        self.taps.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TransportFactory for TappedTransportFactory {
    async fn create(
        &self,
        config: &TransportConfig,
        open_data_channel: bool,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        self.taps.lock().unwrap().push(events.clone());
        self.inner.create(config, open_data_channel, events).await
    }
}

pub struct TestPeer {
    pub session: ChatSession,
    pub events: broadcast::Receiver<SessionEvent>,
}

pub fn alice() -> PeerProfile {
    PeerProfile::new("alice", "Alice")
}

pub fn bob() -> PeerProfile {
    PeerProfile::new("bob", "Bob")
}
