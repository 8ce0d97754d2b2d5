use crate::integration::{connect_pair, init_tracing};
use crate::utils::{TestWorld, alice, bob};

#[tokio::test]
async fn test_close_collects_room() {
    init_tracing();

    let world = TestWorld::new();
    let (a, b) = connect_pair(&world, &alice(), &bob()).await;
    let room_id = a.session.room_id().clone();
    assert!(world.store.candidate_count(&room_id).await > 0);

    a.session.close().await;
    b.session.close().await;

    assert!(world.room(&room_id).await.is_none());
    assert_eq!(world.store.candidate_count(&room_id).await, 0);
    assert_eq!(world.network.open_endpoints(), 0);
}
