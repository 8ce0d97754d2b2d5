use duplex_core::ConversationKey;
use duplex_session::MessagePersistence;

use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob, wait_for_messages};

#[tokio::test]
async fn test_persistence_failure_keeps_log() {
    init_tracing();

    let world = TestWorld::new();
    let (a, b) = connect_pair(&world, &alice(), &bob()).await;
    world.persistence.set_failing(true);

    a.session
        .send_message("not saved")
        .await
        .expect("Send failed")
        .expect("Data channel not open");
    wait_for_messages(&b.session, 1).await.expect("Bob got nothing");
    assert_eq!(a.session.messages().len(), 1);

    a.session.close().await;
    b.session.close().await;

    world.persistence.set_failing(false);
    let key = ConversationKey::for_peers(&alice().id, &bob().id);
    assert!(world
        .persistence
        .load_messages(&key)
        .await
        .expect("Load failed")
        .is_empty());
}
