use std::sync::Arc;

use duplex_session::{
    ChatSession, InMemoryPersistence, InMemorySignalingStore, SessionBackends, SessionConfig,
    TransportConfig, WebRtcTransportFactory,
};

use crate::integration::init_tracing;
use crate::utils::{alice, bob, wait_for_connected, wait_for_messages};

fn local_config() -> SessionConfig {
    SessionConfig {
        transport: TransportConfig {
            ice_servers: vec![],
            include_loopback_candidates: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Real peer connections over the host network stack.
#[tokio::test]
#[ignore = "needs UDP on a local interface"]
async fn test_webrtc_pair_connects() {
    init_tracing();

    let backends = SessionBackends {
        signaling: Arc::new(InMemorySignalingStore::new()),
        transports: Arc::new(WebRtcTransportFactory),
        persistence: Arc::new(InMemoryPersistence::new()),
    };

    let (a, _) = ChatSession::open(local_config(), alice(), bob(), backends.clone());
    let (b, _) = ChatSession::open(local_config(), bob(), alice(), backends);

    wait_for_connected(&a).await.expect("Alice did not connect");
    wait_for_connected(&b).await.expect("Bob did not connect");

    a.send_message("hi over webrtc")
        .await
        .expect("Send failed")
        .expect("Data channel not open");
    let log = wait_for_messages(&b, 1).await.expect("Bob got nothing");
    assert_eq!(log[0].body, "hi over webrtc");

    a.close().await;
    b.close().await;
}
