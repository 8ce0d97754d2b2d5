use duplex_session::{NegotiationState, PeerConnectionState, SessionEvent, TransportEvent};

use crate::integration::init_tracing;
use crate::utils::{
    TappedTransportFactory, TestWorld, alice, bob, wait_for_connected, wait_for_event,
    wait_for_messages,
};

#[tokio::test]
async fn test_transport_failure_keeps_session() {
    init_tracing();

    let world = TestWorld::new();
    let tapped = TappedTransportFactory::new(world.network.clone());
    let mut backends = world.backends();
    backends.transports = tapped.clone();

    let mut a = world.open_with(&alice(), &bob(), backends);
    let b = world.open(&bob(), &alice());
    wait_for_connected(&a.session).await.expect("Alice did not connect");
    wait_for_connected(&b.session).await.expect("Bob did not connect");

    let role = *a.session.role().borrow();
    let room_id = a.session.room_id().clone();
    let offer = world.room(&room_id).await.expect("Room missing").offer_sdp;

    // Both peers stay joined while Alice's transport reports trouble
    let tap = tapped.latest().expect("No transport created");
    for state in [PeerConnectionState::Failed, PeerConnectionState::Disconnected] {
        tap.send(TransportEvent::ConnectionStateChanged(state))
            .await
            .expect("Transport feed closed");
    }

    let mut renegotiations = 0;
    wait_for_event(&mut a.events, |e| {
        if matches!(e, SessionEvent::Renegotiating) {
            renegotiations += 1;
        }
        matches!(
            e,
            SessionEvent::TransportState(PeerConnectionState::Disconnected)
        )
    })
    .await
    .expect("Disconnected state was not forwarded");

    assert_eq!(renegotiations, 0);
    assert_eq!(*a.session.role().borrow(), role);
    assert_eq!(*a.session.state().borrow(), NegotiationState::Connected);
    let doc = world.room(&room_id).await.expect("Room missing");
    assert_eq!(doc.offer_sdp, offer);
    assert_eq!(doc.joined_users.len(), 2);

    // The link itself is untouched
    a.session
        .send_message("still here")
        .await
        .expect("Send failed")
        .expect("Data channel not open");
    let log = wait_for_messages(&b.session, 1).await.expect("Bob got nothing");
    assert_eq!(log[0].body, "still here");

    a.session.close().await;
    b.session.close().await;
}
