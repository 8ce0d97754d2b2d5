use duplex_core::{RoomId, RoomStatus};
use duplex_session::{ConnectionStatus, Role};

use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob};

#[tokio::test]
async fn test_sequential_open_connects() {
    init_tracing();

    let world = TestWorld::new();
    let (a, b) = connect_pair(&world, &alice(), &bob()).await;

    // First to open creates the room and calls
    assert_eq!(*a.session.role().borrow(), Some(Role::Caller));
    assert_eq!(*b.session.role().borrow(), Some(Role::Answerer));
    assert_eq!(*a.session.status().borrow(), ConnectionStatus::Connected);
    assert_eq!(*b.session.status().borrow(), ConnectionStatus::Connected);

    let room_id = RoomId::for_peers(&alice().id, &bob().id);
    assert_eq!(a.session.room_id(), &room_id);
    let doc = world.room(&room_id).await.expect("Room missing");
    assert!(doc.is_offered_by(&alice().id));
    assert_eq!(doc.answer_by, Some(bob().id));
    assert_eq!(doc.status, RoomStatus::Answered);
    assert_eq!(doc.joined_users.len(), 2);

    a.session.close().await;
    b.session.close().await;
}
