use crate::error::TransportError;
use crate::transport::{
    PeerConnectionState, PeerTransport, SdpKind, TransportConfig, TransportEvent,
    TransportFactory,
};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use duplex_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

const OFFER_PREFIX: &str = "loopback-offer";
const ANSWER_PREFIX: &str = "loopback-answer";
const CANDIDATE_PREFIX: &str = "candidate:loopback";

struct Endpoint {
    events: mpsc::Sender<TransportEvent>,
    local_offer: bool,
    local_answer: bool,
    /// Token of the endpoint whose description was applied as remote.
    remote: Option<String>,
    remote_candidate: bool,
    linked: Option<String>,
}

/// In-process stand-in for the network between peer transports. Two
/// endpoints connect once the caller has applied the answer and each side
/// has received a candidate naming the other.
#[derive(Default)]
pub struct LoopbackNetwork {
    endpoints: DashMap<String, Endpoint>,
}

impl LoopbackNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of transports created and not yet closed.
    pub fn open_endpoints(&self) -> usize {
        self.endpoints.len()
    }

    fn register(&self, events: mpsc::Sender<TransportEvent>) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.endpoints.insert(
            token.clone(),
            Endpoint {
                events,
                local_offer: false,
                local_answer: false,
                remote: None,
                remote_candidate: false,
                linked: None,
            },
        );
        token
    }

    fn sender(&self, token: &str) -> Option<mpsc::Sender<TransportEvent>> {
        self.endpoints.get(token).map(|e| e.events.clone())
    }

    fn ready(&self, token: &str, answering: bool) -> Option<String> {
        let endpoint = self.endpoints.get(token)?;
        let local_ready = if answering {
            endpoint.local_answer
        } else {
            endpoint.local_offer
        };
        if !local_ready || !endpoint.remote_candidate || endpoint.linked.is_some() {
            return None;
        }
        endpoint.remote.clone()
    }

    /// Links `caller` and its answerer if both sides are ready. The caller's
    /// entry gates the link so concurrent attempts emit it once.
    async fn try_link(&self, caller: &str) {
        let Some(answerer) = self.ready(caller, false) else {
            return;
        };
        if self.ready(&answerer, true).as_deref() != Some(caller) {
            return;
        }

        {
            let Some(mut entry) = self.endpoints.get_mut(caller) else {
                return;
            };
            if entry.linked.is_some() {
                return;
            }
            entry.linked = Some(answerer.clone());
        }
        if let Some(mut entry) = self.endpoints.get_mut(&answerer) {
            entry.linked = Some(caller.to_owned());
        }

        debug!("Loopback link {} <-> {}", caller, answerer);
        for token in [caller, answerer.as_str()] {
            let Some(tx) = self.sender(token) else {
                continue;
            };
            for event in [
                TransportEvent::ConnectionStateChanged(PeerConnectionState::Connecting),
                TransportEvent::ConnectionStateChanged(PeerConnectionState::Connected),
                TransportEvent::DataChannelOpen,
            ] {
                let _ = tx.send(event).await;
            }
        }
    }
}

fn candidate_for(token: &str) -> IceCandidate {
    IceCandidate {
        candidate: format!("{} {}", CANDIDATE_PREFIX, token),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
    }
}

/// [`PeerTransport`] connected through a [`LoopbackNetwork`]. Descriptions
/// are plain tokens, so the full offer/answer/candidate exchange still has to
/// travel through signaling for two transports to connect.
pub struct LoopbackTransport {
    token: String,
    network: Arc<LoopbackNetwork>,
}

impl LoopbackTransport {
    pub fn new(network: Arc<LoopbackNetwork>, events: mpsc::Sender<TransportEvent>) -> Self {
        let token = network.register(events);
        Self { token, network }
    }

    async fn emit_local_candidate(&self) {
        if let Some(tx) = self.network.sender(&self.token) {
            let _ = tx
                .send(TransportEvent::LocalCandidate(candidate_for(&self.token)))
                .await;
        }
    }
}

#[async_trait]
impl PeerTransport for LoopbackTransport {
    async fn create_local_offer(&self) -> Result<String, TransportError> {
        {
            let mut endpoint = self
                .network
                .endpoints
                .get_mut(&self.token)
                .ok_or(TransportError::Closed)?;
            endpoint.local_offer = true;
        }
        self.emit_local_candidate().await;
        Ok(format!("{} {}", OFFER_PREFIX, self.token))
    }

    async fn create_local_answer(&self) -> Result<String, TransportError> {
        let offer_token = {
            let mut endpoint = self
                .network
                .endpoints
                .get_mut(&self.token)
                .ok_or(TransportError::Closed)?;
            let Some(offer_token) = endpoint.remote.clone() else {
                return Err(TransportError::Description(
                    "no remote offer to answer".to_owned(),
                ));
            };
            endpoint.local_answer = true;
            offer_token
        };
        self.emit_local_candidate().await;
        self.network.try_link(&offer_token).await;
        Ok(format!("{} {} {}", ANSWER_PREFIX, self.token, offer_token))
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), TransportError> {
        let mut parts = sdp.split_whitespace();
        let remote = match (kind, parts.next(), parts.next(), parts.next()) {
            (SdpKind::Offer, Some(OFFER_PREFIX), Some(token), None) => token.to_owned(),
            (SdpKind::Answer, Some(ANSWER_PREFIX), Some(token), Some(offer))
                if offer == self.token =>
            {
                token.to_owned()
            }
            _ => {
                return Err(TransportError::Description(format!(
                    "unexpected {:?} description: {:?}",
                    kind, sdp
                )));
            }
        };

        {
            let mut endpoint = self
                .network
                .endpoints
                .get_mut(&self.token)
                .ok_or(TransportError::Closed)?;
            if kind == SdpKind::Answer && !endpoint.local_offer {
                return Err(TransportError::Description(
                    "answer applied without a local offer".to_owned(),
                ));
            }
            endpoint.remote = Some(remote);
            endpoint.remote_candidate = false;
        }

        if kind == SdpKind::Answer {
            self.network.try_link(&self.token).await;
        }
        Ok(())
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let caller = {
            let mut endpoint = self
                .network
                .endpoints
                .get_mut(&self.token)
                .ok_or(TransportError::Closed)?;
            let Some(remote) = endpoint.remote.clone() else {
                return Err(TransportError::Candidate(
                    "remote description not set".to_owned(),
                ));
            };
            // Candidates of another transport generation never connect.
            if candidate.candidate != candidate_for(&remote).candidate {
                debug!("Ignoring foreign loopback candidate {}", candidate.candidate);
                return Ok(());
            }
            endpoint.remote_candidate = true;
            if endpoint.local_answer {
                remote
            } else {
                self.token.clone()
            }
        };

        self.network.try_link(&caller).await;
        Ok(())
    }

    async fn send_data(&self, data: Bytes) -> bool {
        let Some(peer) = self
            .network
            .endpoints
            .get(&self.token)
            .and_then(|e| e.linked.clone())
        else {
            return false;
        };
        let Some(tx) = self.network.sender(&peer) else {
            return false;
        };
        tx.send(TransportEvent::Message(data)).await.is_ok()
    }

    async fn close(&self) {
        let Some((_, endpoint)) = self.network.endpoints.remove(&self.token) else {
            return;
        };
        debug!(
            "Closing loopback transport {} (answering: {})",
            self.token, endpoint.local_answer
        );
        let _ = endpoint
            .events
            .send(TransportEvent::ConnectionStateChanged(PeerConnectionState::Closed))
            .await;

        let Some(peer) = endpoint.linked else {
            return;
        };
        let peer_tx = self.network.endpoints.get_mut(&peer).map(|mut e| {
            e.linked = None;
            e.events.clone()
        });
        if let Some(tx) = peer_tx {
            let _ = tx
                .send(TransportEvent::ConnectionStateChanged(
                    PeerConnectionState::Disconnected,
                ))
                .await;
            let _ = tx.send(TransportEvent::DataChannelClosed).await;
        }
    }
}

impl Drop for LoopbackTransport {
    fn drop(&mut self) {
        self.network.endpoints.remove(&self.token);
    }
}

/// Creates [`LoopbackTransport`]s on a shared network.
#[derive(Clone, Default)]
pub struct LoopbackTransportFactory {
    network: Arc<LoopbackNetwork>,
}

impl LoopbackTransportFactory {
    pub fn new(network: Arc<LoopbackNetwork>) -> Self {
        Self { network }
    }

    pub fn network(&self) -> &Arc<LoopbackNetwork> {
        &self.network
    }
}

#[async_trait]
impl TransportFactory for LoopbackTransportFactory {
    async fn create(
        &self,
        _config: &TransportConfig,
        _open_data_channel: bool,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        Ok(Arc::new(LoopbackTransport::new(self.network.clone(), events)))
    }
}
