use duplex_core::RoomId;
use duplex_session::{ChatSession, Role, SessionConfig};

use crate::integration::init_tracing;
use crate::utils::{TestWorld, alice, bob, wait_for_connected};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_open_converges() {
    init_tracing();

    for _ in 0..10 {
        let world = TestWorld::new();
        let (a, b) = (alice(), bob());

        let ((alice_session, _alice_events), (bob_session, _bob_events)) = futures::join!(
            async { ChatSession::open(SessionConfig::default(), a.clone(), b.clone(), world.backends()) },
            async { ChatSession::open(SessionConfig::default(), b.clone(), a.clone(), world.backends()) },
        );

        let (alice_ready, bob_ready) = futures::join!(
            wait_for_connected(&alice_session),
            wait_for_connected(&bob_session),
        );
        alice_ready.expect("Alice did not connect");
        bob_ready.expect("Bob did not connect");

        let alice_role = alice_session.role().borrow().expect("Alice has no role");
        let bob_role = bob_session.role().borrow().expect("Bob has no role");
        assert_ne!(alice_role, bob_role, "Exactly one peer must call");

        // The caller is the peer the room names as offerer
        let doc = world
            .room(&RoomId::for_peers(&a.id, &b.id))
            .await
            .expect("Room missing");
        let caller = if alice_role == Role::Caller { &a.id } else { &b.id };
        assert!(doc.is_offered_by(caller));

        alice_session.close().await;
        bob_session.close().await;
    }
}
