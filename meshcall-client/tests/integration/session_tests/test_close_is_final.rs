use meshcall_client::media::LocalTracks;
use meshcall_client::session::{NegotiationState, Role};
use meshcall_core::{ParticipantId, SessionDescription};

use super::{candidate, session_rig};
use crate::integration::init_tracing;

#[tokio::test]
async fn test_close_is_final() {
    init_tracing();

    let local = ParticipantId::new();
    let remote = ParticipantId::new();
    let mut rig = session_rig(&local, &remote, Role::Offerer, LocalTracks::empty()).await;

    rig.session.start_offer().await.expect("offer");
    rig.session.handle_remote_candidate(candidate("queued")).await;

    rig.session.close().await;
    rig.session.close().await;

    assert_eq!(rig.session.state(), NegotiationState::Closed);
    assert_eq!(rig.connection.close_count(), 1);
    assert_eq!(rig.session.pending_remote_candidates(), 0);

    // Late completions are ignored.
    rig.session
        .handle_answer(SessionDescription::answer("mock-answer;n=1;stream=;tracks="))
        .await
        .expect("late answer is ignored");
    rig.session.handle_remote_candidate(candidate("late")).await;

    assert!(rig.connection.remote_sdps().is_empty());
    assert!(rig.connection.candidates_added().is_empty());
    assert_eq!(rig.session.state(), NegotiationState::Closed);

    rig.session.fail().await;
    assert_eq!(rig.session.state(), NegotiationState::Closed);
}
