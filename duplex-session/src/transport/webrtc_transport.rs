use crate::error::TransportError;
use crate::transport::{
    PeerConnectionState, PeerTransport, SdpKind, TransportConfig, TransportEvent,
    TransportFactory,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use duplex_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

type ChannelSlot = Arc<Mutex<Option<Arc<RTCDataChannel>>>>;

/// [`PeerTransport`] backed by a `webrtc` peer connection with one data channel.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: ChannelSlot,
}

impl WebRtcTransport {
    /// Builds the peer connection and wires its callbacks into `event_tx`.
    pub async fn new(
        config: &TransportConfig,
        open_data_channel: bool,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let mut settings = SettingEngine::default();
        settings.set_include_loopback_candidate(config.include_loopback_candidates);

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .with_setting_engine(settings)
            .build();

        let ice_servers = if config.ice_servers.is_empty() {
            vec![]
        } else {
            vec![RTCIceServer {
                urls: config.ice_servers.clone(),
                ..Default::default()
            }]
        };
        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);
        let data_channel: ChannelSlot = Arc::new(Mutex::new(None));

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let _ = tx
                        .send(TransportEvent::ConnectionStateChanged(map_state(s)))
                        .await;
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                };
                let _ = tx.send(TransportEvent::LocalCandidate(candidate)).await;
            })
        }));

        if open_data_channel {
            let dc = peer_connection
                .create_data_channel(&config.data_channel_label, None)
                .await
                .context("Failed to create data channel")?;
            attach_data_channel(dc, data_channel.clone(), event_tx.clone());
        } else {
            let slot = data_channel.clone();
            let dc_tx = event_tx.clone();
            peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let slot = slot.clone();
                let tx = dc_tx.clone();
                Box::pin(async move {
                    debug!("Remote data channel '{}' announced", dc.label());
                    attach_data_channel(dc, slot, tx);
                })
            }));
        }

        Ok(Self {
            peer_connection,
            data_channel,
        })
    }

    async fn local_description(&self, kind: SdpKind) -> Result<String> {
        let description = match kind {
            SdpKind::Offer => self.peer_connection.create_offer(None).await?,
            SdpKind::Answer => self.peer_connection.create_answer(None).await?,
        };
        self.peer_connection
            .set_local_description(description.clone())
            .await
            .context("Failed to set local description")?;
        Ok(description.sdp)
    }

    async fn remote_description(&self, kind: SdpKind, sdp: String) -> Result<()> {
        let description = match kind {
            SdpKind::Offer => RTCSessionDescription::offer(sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(sdp)?,
        };
        self.peer_connection
            .set_remote_description(description)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }
}

fn attach_data_channel(
    dc: Arc<RTCDataChannel>,
    slot: ChannelSlot,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let open_tx = event_tx.clone();
    let dc_on_open = dc.clone();
    dc.on_open(Box::new(move || {
        let tx = open_tx.clone();
        let slot = slot.clone();
        let channel_ready = dc_on_open.clone();
        Box::pin(async move {
            info!("Data channel '{}' open", channel_ready.label());
            *slot.lock().await = Some(channel_ready);
            let _ = tx.send(TransportEvent::DataChannelOpen).await;
        })
    }));

    let close_tx = event_tx.clone();
    dc.on_close(Box::new(move || {
        let tx = close_tx.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::DataChannelClosed).await;
        })
    }));

    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = event_tx.clone();
        Box::pin(async move {
            let bytes = Bytes::from(msg.data.to_vec());
            let _ = tx.send(TransportEvent::Message(bytes)).await;
        })
    }));
}

fn map_state(state: RTCPeerConnectionState) -> PeerConnectionState {
    match state {
        RTCPeerConnectionState::Connecting => PeerConnectionState::Connecting,
        RTCPeerConnectionState::Connected => PeerConnectionState::Connected,
        RTCPeerConnectionState::Disconnected => PeerConnectionState::Disconnected,
        RTCPeerConnectionState::Failed => PeerConnectionState::Failed,
        RTCPeerConnectionState::Closed => PeerConnectionState::Closed,
        _ => PeerConnectionState::New,
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_local_offer(&self) -> Result<String, TransportError> {
        self.local_description(SdpKind::Offer)
            .await
            .map_err(|e| TransportError::Description(format!("{:#}", e)))
    }

    async fn create_local_answer(&self) -> Result<String, TransportError> {
        self.local_description(SdpKind::Answer)
            .await
            .map_err(|e| TransportError::Description(format!("{:#}", e)))
    }

    async fn set_remote_description(
        &self,
        kind: SdpKind,
        sdp: String,
    ) -> Result<(), TransportError> {
        self.remote_description(kind, sdp)
            .await
            .map_err(|e| TransportError::Description(format!("{:#}", e)))
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(|e| TransportError::Candidate(e.to_string()))
    }

    async fn send_data(&self, data: Bytes) -> bool {
        let Some(dc) = self.data_channel.lock().await.clone() else {
            return false;
        };
        if dc.ready_state() != RTCDataChannelState::Open {
            return false;
        }
        match dc.send(&data).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Failed to send on data channel: {}", e);
                false
            }
        }
    }

    async fn close(&self) {
        if let Some(dc) = self.data_channel.lock().await.take() {
            let _ = dc.close().await;
        }
        if let Err(e) = self.peer_connection.close().await {
            warn!("Failed to close peer connection: {}", e);
        }
    }
}

/// Creates [`WebRtcTransport`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebRtcTransportFactory;

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        config: &TransportConfig,
        open_data_channel: bool,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(config, open_data_channel, events)
            .await
            .map_err(|e| TransportError::Setup(format!("{:#}", e)))?;
        Ok(Arc::new(transport))
    }
}
