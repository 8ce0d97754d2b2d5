use duplex_session::{SessionError, SessionEvent, StoreError};

use crate::integration::init_tracing;
use crate::utils::{TestWorld, alice, bob, wait_for_event};

#[tokio::test]
async fn test_offline_store_is_reported() {
    init_tracing();

    let world = TestWorld::new();
    world.store.set_offline(true);

    let mut a = world.open(&alice(), &bob());
    let event = wait_for_event(&mut a.events, |e| matches!(e, SessionEvent::Error(_)))
        .await
        .expect("No error reported");
    assert!(matches!(
        event,
        SessionEvent::Error(SessionError::Store(StoreError::Unavailable(_)))
    ));

    // The session survives and can retry once the store is back
    world.store.set_offline(false);
    a.session.reconnect().await.expect("Session closed");
    crate::utils::wait_for_room(&world, a.session.room_id(), |doc| {
        doc.is_some_and(|d| d.is_joined(&alice().id) && d.has_offer())
    })
    .await
    .expect("Retry did not publish an offer");

    a.session.close().await;
}
