use duplex_core::{PeerId, RoomPatch};
use duplex_session::{
    NegotiationState, SessionError, SessionEvent, SignalingChannel, TransportError,
};

use crate::integration::init_tracing;
use crate::utils::{TestWorld, alice, bob, wait_for_event, wait_for_room, wait_for_state};

#[tokio::test]
async fn test_bogus_answer_is_reported() {
    init_tracing();

    let world = TestWorld::new();
    let mut a = world.open(&alice(), &bob());
    let room_id = a.session.room_id().clone();
    wait_for_room(&world, &room_id, |doc| doc.is_some_and(|d| d.has_offer()))
        .await
        .expect("No offer published");

    world
        .store
        .set_merge(&room_id, RoomPatch::answer("garbage".into(), &PeerId::from("bob")))
        .await
        .expect("Failed to write answer");

    let event = wait_for_event(&mut a.events, |e| matches!(e, SessionEvent::Error(_)))
        .await
        .expect("No error reported");
    assert!(matches!(
        event,
        SessionEvent::Error(SessionError::Transport(TransportError::Description(_)))
    ));

    // Non-fatal: still offering, still answering commands
    wait_for_state(&a.session, NegotiationState::CallerOffering)
        .await
        .expect("Negotiation left the offering state");
    assert!(a.session.send_message("hello?").await.expect("Send failed").is_none());

    a.session.close().await;
}
