use duplex_core::MessageKind;
use duplex_session::SessionEvent;

use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob, wait_for_event, wait_for_messages};

#[tokio::test]
async fn test_message_delivery() {
    init_tracing();

    let world = TestWorld::new();
    let (mut a, b) = connect_pair(&world, &alice(), &bob()).await;

    let sent = a
        .session
        .send_message("hi")
        .await
        .expect("Send failed")
        .expect("Data channel not open");
    assert!(sent.is_from_me());

    let bob_log = wait_for_messages(&b.session, 1).await.expect("Bob got nothing");
    assert_eq!(bob_log.len(), 1);
    assert_eq!(bob_log[0].sender_id, alice().id);
    assert_eq!(bob_log[0].sender_name, "Alice");
    assert_eq!(bob_log[0].body, "hi");
    assert_eq!(bob_log[0].id, sent.id);
    assert!(!bob_log[0].is_from_me());

    let alice_log = a.session.messages();
    assert_eq!(alice_log.len(), 1);
    assert_eq!(alice_log[0].sender_id, alice().id);
    assert!(alice_log[0].is_from_me());

    let appended = wait_for_event(&mut a.events, |e| matches!(e, SessionEvent::MessageAppended(_)))
        .await
        .expect("No append event");
    assert!(matches!(appended, SessionEvent::MessageAppended(m) if m.body == "hi"));

    // Replies keep order and kind
    b.session
        .send(MessageKind::Image, "cat.png")
        .await
        .expect("Send failed")
        .expect("Data channel not open");
    b.session.send_message("nice").await.expect("Send failed");

    let alice_log = wait_for_messages(&a.session, 3).await.expect("Alice missed replies");
    let bodies: Vec<&str> = alice_log.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, ["hi", "cat.png", "nice"]);
    assert_eq!(alice_log[1].kind, MessageKind::Image);
    assert!(!alice_log[2].is_from_me());

    a.session.close().await;
    b.session.close().await;
}
