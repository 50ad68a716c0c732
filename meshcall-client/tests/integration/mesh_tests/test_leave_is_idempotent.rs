use meshcall_client::media::MediaConstraints;
use meshcall_client::{MeshError, MeshEvent};

use crate::integration::{create_relay, init_tracing, join_peer};
use crate::utils::{drain_events, wait_for_event, wait_for_peers};

#[tokio::test]
async fn test_leave_is_idempotent() {
    init_tracing();

    let relay = create_relay();
    let mut p1 = join_peer(&relay, "p1", MediaConstraints::camera()).await;
    let mut p2 = join_peer(&relay, "p2", MediaConstraints::default()).await;
    let id1 = p1.mesh.local_id.clone();
    let id2 = p2.mesh.local_id.clone();

    for peer in [&mut p1, &mut p2] {
        wait_for_event(&mut peer.mesh.events, |e| {
            matches!(e, MeshEvent::PeerConnected { .. })
        })
        .await
        .expect("connect");
    }

    p1.mesh.handle.leave().await.expect("first leave");
    p1.mesh.handle.leave().await.expect("second leave is a no-op");

    let c12 = p1.factory.latest_to(&id2).expect("P1 -> P2 connection");
    assert_eq!(c12.close_count(), 1);
    assert_eq!(p1.media.released().len(), 1);

    // The coordinator is gone, its event stream ends.
    drain_events(&mut p1.mesh.events).await;
    assert!(p1.mesh.events.recv().await.is_none());
    assert!(p1.mesh.handle.is_closed());
    assert!(matches!(
        p1.mesh.handle.peers().await,
        Err(MeshError::Closed)
    ));

    let left = wait_for_event(&mut p2.mesh.events, |e| {
        matches!(e, MeshEvent::PeerDisconnected { .. })
    })
    .await
    .expect("P2 sees P1 leave");
    assert_eq!(left, MeshEvent::PeerDisconnected { participant: id1 });

    wait_for_peers(&p2.mesh.handle, |p| p.is_empty())
        .await
        .expect("P2 dropped the session");
}
