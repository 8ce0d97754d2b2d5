use duplex_core::RoomStatus;
use duplex_session::{Role, SessionEvent};

use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob, wait_for_connected, wait_for_event, wait_for_room};

#[tokio::test]
async fn test_peer_leave_renegotiates() {
    init_tracing();

    let world = TestWorld::new();
    // Bob opens first, so Alice starts out as the answerer
    let (b, mut a) = connect_pair(&world, &bob(), &alice()).await;
    assert_eq!(*a.session.role().borrow(), Some(Role::Answerer));
    let room_id = a.session.room_id().clone();

    b.session.close().await;

    wait_for_event(&mut a.events, |e| matches!(e, SessionEvent::Renegotiating))
        .await
        .expect("Alice did not renegotiate");
    let role = wait_for_event(&mut a.events, |e| matches!(e, SessionEvent::RoleResolved(_)))
        .await
        .expect("Alice did not take a role");
    assert!(matches!(role, SessionEvent::RoleResolved(Role::Caller)));

    // Fresh generation: only Alice is in, with a new offer
    let doc = wait_for_room(&world, &room_id, |doc| {
        doc.is_some_and(|d| d.status == RoomStatus::WaitingAnswer && d.is_offered_by(&alice().id))
    })
    .await
    .expect("No fresh offer")
    .expect("Room missing");
    assert_eq!(doc.joined_users.len(), 1);
    assert!(doc.answer_sdp.is_none());

    // Bob comes back and answers the new offer
    let b = world.open(&bob(), &alice());
    wait_for_connected(&b.session).await.expect("Bob did not reconnect");
    wait_for_connected(&a.session).await.expect("Alice did not reconnect");
    assert_eq!(*b.session.role().borrow(), Some(Role::Answerer));

    a.session
        .send_message("welcome back")
        .await
        .expect("Send failed")
        .expect("Data channel not open");

    // Bob's return is not a departure: no second restart
    let mut renegotiations = 0;
    while let Ok(event) = a.events.try_recv() {
        if matches!(event, SessionEvent::Renegotiating) {
            renegotiations += 1;
        }
    }
    assert_eq!(renegotiations, 0);

    a.session.close().await;
    b.session.close().await;
}
