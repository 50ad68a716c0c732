use meshcall_client::MeshEvent;
use meshcall_client::connection::ConnectionState;
use meshcall_client::media::MediaConstraints;
use meshcall_client::session::{NegotiationState, Role};

use crate::integration::{create_relay, init_tracing, join_peer};
use crate::utils::{wait_for_event, wait_until};

#[tokio::test]
async fn test_two_peers_single_exchange() {
    init_tracing();

    let relay = create_relay();
    let mut p1 = join_peer(&relay, "p1", MediaConstraints::default()).await;
    let mut p2 = join_peer(&relay, "p2", MediaConstraints::default()).await;
    let id1 = p1.mesh.local_id.clone();
    let id2 = p2.mesh.local_id.clone();

    // The newcomer offers, the existing member answers.
    let joined = wait_for_event(&mut p1.mesh.events, |e| {
        matches!(e, MeshEvent::PeerJoined { .. })
    })
    .await
    .expect("P1 should see P2");
    assert_eq!(
        joined,
        MeshEvent::PeerJoined {
            participant: id2.clone(),
            role: Role::Answerer
        }
    );

    let joined = wait_for_event(&mut p2.mesh.events, |e| {
        matches!(e, MeshEvent::PeerJoined { .. })
    })
    .await
    .expect("P2 should see P1");
    assert_eq!(
        joined,
        MeshEvent::PeerJoined {
            participant: id1.clone(),
            role: Role::Offerer
        }
    );

    for (peer, remote) in [(&mut p1, &id2), (&mut p2, &id1)] {
        let connected = wait_for_event(&mut peer.mesh.events, |e| {
            matches!(e, MeshEvent::PeerConnected { .. })
        })
        .await
        .expect("peer should connect");
        assert_eq!(
            connected,
            MeshEvent::PeerConnected {
                participant: remote.clone()
            }
        );

        let peers = peer.mesh.handle.peers().await.expect("peers");
        assert_eq!(peers.len(), 1);
        assert_eq!(&peers[0].participant, remote);
        assert_eq!(peers[0].state, NegotiationState::Connected);
        assert_eq!(peers[0].link_state, ConnectionState::Connected);
    }

    // Exactly one offer/answer pair for the pair of participants.
    assert_eq!(p1.factory.created().len(), 1);
    assert_eq!(p2.factory.created().len(), 1);
    let c12 = p1.factory.latest_to(&id2).expect("P1 -> P2 connection");
    let c21 = p2.factory.latest_to(&id1).expect("P2 -> P1 connection");
    assert_eq!(c21.offers_created(), 1);
    assert_eq!(c21.answers_created(), 0);
    assert_eq!(c12.offers_created(), 0);
    assert_eq!(c12.answers_created(), 1);

    // Trickled candidates crossed in both directions.
    wait_until("P1 has P2's candidate", || c12.candidates_added().len() == 1)
        .await
        .expect("candidate to P1");
    wait_until("P2 has P1's candidate", || c21.candidates_added().len() == 1)
        .await
        .expect("candidate to P2");
}
