use crate::integration::{create_registry, init_tracing};
use crate::utils::TestMember;

#[tokio::test]
async fn test_room_released_after_last_leave() {
    init_tracing();

    let (registry, room_id) = create_registry();

    let p1 = TestMember::connect(&registry, &room_id)
        .await
        .expect("P1 failed to connect");
    let p2 = TestMember::connect(&registry, &room_id)
        .await
        .expect("P2 failed to connect");
    assert_eq!(registry.room_count(), 1);

    p1.disconnect().await.expect("P1 disconnect failed");
    assert!(registry.contains(&room_id), "room still has P2");

    p2.disconnect().await.expect("P2 disconnect failed");
    assert!(!registry.contains(&room_id));
    assert_eq!(registry.room_count(), 0);

    // Rejoining starts a fresh room.
    let p3 = TestMember::connect(&registry, &room_id)
        .await
        .expect("P3 failed to connect");
    assert!(p3.welcome.members.is_empty());
    assert_eq!(p3.welcome.version, 1);
}
