use crate::integration::init_tracing;
use crate::utils::{TestWorld, alice, bob};

#[tokio::test]
async fn test_send_before_connect() {
    init_tracing();

    let world = TestWorld::new();
    let a = world.open(&alice(), &bob());

    // Nobody on the other side: there is no data channel to send on
    let result = a.session.send_message("anyone?").await.expect("Send failed");
    assert!(result.is_none());
    assert!(a.session.messages().is_empty());

    a.session.close().await;
}
