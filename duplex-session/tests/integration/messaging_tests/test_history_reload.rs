use duplex_core::{ConversationKey, PeerId};
use duplex_session::MessagePersistence;

use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob, wait_for_messages};

#[tokio::test]
async fn test_history_reload() {
    init_tracing();

    let world = TestWorld::new();
    let (a, b) = connect_pair(&world, &alice(), &bob()).await;

    a.session.send_message("hi").await.expect("Send failed");
    wait_for_messages(&b.session, 1).await.expect("Bob got nothing");
    b.session.send_message("hello").await.expect("Send failed");
    wait_for_messages(&a.session, 2).await.expect("Alice got nothing");

    a.session.close().await;
    b.session.close().await;

    // Both sides mirrored the same two messages
    let key = ConversationKey::for_peers(&alice().id, &bob().id);
    let stored = world
        .persistence
        .load_messages(&key)
        .await
        .expect("Load failed");
    assert_eq!(stored.len(), 2);

    let summaries = world
        .persistence
        .conversation_summaries(&PeerId::from("alice"))
        .await
        .expect("Summaries failed");
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].other_name, "Bob");
    assert_eq!(summaries[0].last_message, "hello");

    // Reopening loads the conversation, owned from the loader's side
    let a = world.open(&alice(), &bob());
    let log = wait_for_messages(&a.session, 2).await.expect("History not loaded");
    assert_eq!(log[0].body, "hi");
    assert!(log[0].is_from_me());
    assert_eq!(log[1].body, "hello");
    assert!(!log[1].is_from_me());

    a.session.close().await;
}
