use duplex_core::{RoomId, RoomPatch};
use duplex_session::{
    NegotiationState, Role, SessionError, SessionEvent, SignalingChannel, TransportError,
};

use crate::integration::init_tracing;
use crate::utils::{TestWorld, alice, bob, wait_for_connected, wait_for_event, wait_for_state};

#[tokio::test]
async fn test_answerer_waits_for_offer() {
    init_tracing();

    let world = TestWorld::new();
    let room_id = RoomId::for_peers(&alice().id, &bob().id);

    // Left over from an earlier visit by Alice whose transport is gone
    world
        .store
        .set_merge(&room_id, RoomPatch::create(&alice().id, &bob().id))
        .await
        .expect("Failed to seed room");
    world
        .store
        .set_merge(&room_id, RoomPatch::offer("stale-offer".into(), &alice().id))
        .await
        .expect("Failed to seed offer");

    let mut b = world.open(&bob(), &alice());

    // Answering the stale offer fails and is reported, Bob keeps waiting
    let event = wait_for_event(&mut b.events, |e| matches!(e, SessionEvent::Error(_)))
        .await
        .expect("No error reported for the stale offer");
    assert!(matches!(
        event,
        SessionEvent::Error(SessionError::Transport(TransportError::Description(_)))
    ));
    assert_eq!(*b.session.role().borrow(), Some(Role::Answerer));
    wait_for_state(&b.session, NegotiationState::AnswererAwaitingOffer)
        .await
        .expect("Bob is not waiting for an offer");

    // Alice returns, publishes a fresh offer and Bob answers it
    let a = world.open(&alice(), &bob());
    assert!(matches!(
        *a.session.role().borrow(),
        None | Some(Role::Caller)
    ));
    wait_for_connected(&a.session)
        .await
        .expect("Alice did not connect");
    wait_for_connected(&b.session)
        .await
        .expect("Bob did not connect");
    assert_eq!(*a.session.role().borrow(), Some(Role::Caller));

    a.session.close().await;
    b.session.close().await;
}
