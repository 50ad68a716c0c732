use meshcall_client::MeshError;
use meshcall_client::media::{LocalTracks, MediaConstraints};
use meshcall_client::session::{GlareResolution, NegotiationState, Role};
use meshcall_core::SignalKind;
use std::sync::Arc;

use super::{description_of, ordered_pair, session_rig};
use crate::integration::init_tracing;
use crate::utils::{SignalingState, tracks_for};

#[tokio::test]
async fn test_glare_larger_id_yields() {
    init_tracing();

    let (small, large) = ordered_pair();
    let mut s = session_rig(&small, &large, Role::Offerer, LocalTracks::empty()).await;
    let mut l = session_rig(&large, &small, Role::Offerer, LocalTracks::empty()).await;

    s.session.start_offer().await.expect("small offers");
    l.session.start_offer().await.expect("large offers");
    let offer_s = s.sent.try_recv().expect("small offer");
    let offer_l = l.sent.try_recv().expect("large offer");

    // Smaller id keeps its offer.
    let err = s
        .session
        .handle_offer(description_of(&offer_l))
        .await
        .expect_err("small side must not answer");
    assert!(matches!(err, MeshError::GlareConflict(ref id) if id == &large));
    assert_eq!(s.session.glare_resolution(), GlareResolution::KeepLocal);
    assert!(s.session.has_pending_offer());
    assert_eq!(s.connection.signaling_state(), SignalingState::HaveLocalOffer);

    // Larger id cannot undo its offer, so it answers on a new connection.
    let err = l
        .session
        .handle_offer(description_of(&offer_s))
        .await
        .expect_err("conflict is reported before anything is applied");
    assert!(matches!(err, MeshError::GlareConflict(ref id) if id == &small));
    assert_eq!(l.session.glare_resolution(), GlareResolution::Yield);
    assert_eq!(l.connection.signaling_state(), SignalingState::HaveLocalOffer);

    let abandoned = Arc::clone(&l.connection);
    let fresh = l.fresh_connection(1).await;
    l.session
        .replace_connection(fresh, 1, Role::Answerer)
        .await
        .expect("replace connection");
    assert_eq!(abandoned.close_count(), 1);
    assert_eq!(l.session.generation(), 1);
    assert_eq!(l.session.role(), Role::Answerer);
    assert!(!l.session.has_pending_offer());

    l.session
        .handle_offer(description_of(&offer_s))
        .await
        .expect("large side answers");
    let answer = l.sent.try_recv().expect("answer from large");
    assert_eq!(answer.kind, SignalKind::Answer);
    s.session
        .handle_answer(description_of(&answer))
        .await
        .expect("answer applies");

    // One exchange settles it: nothing was pending besides the first offer.
    assert!(l.sent.try_recv().is_err(), "no extra offer after yielding");
    assert_eq!(s.session.state(), NegotiationState::Connected);
    assert_eq!(l.session.state(), NegotiationState::Connected);
    assert_eq!(s.session.role(), Role::Offerer);
    assert_eq!(s.connection.signaling_state(), SignalingState::Stable);
    assert_eq!(l.connection.signaling_state(), SignalingState::Stable);
    assert_eq!(l.connection.offers_created(), 0);
    assert_eq!(l.connection.answers_created(), 1);
}

#[tokio::test]
async fn test_glare_while_renegotiating_restarts_pair() {
    init_tracing();

    let (small, large) = ordered_pair();
    let mut s = session_rig(&small, &large, Role::Offerer, LocalTracks::empty()).await;
    let mut l = session_rig(&large, &small, Role::Answerer, LocalTracks::empty()).await;

    s.session.start_offer().await.expect("offer");
    let offer = s.sent.try_recv().expect("offer");
    l.session
        .handle_offer(description_of(&offer))
        .await
        .expect("answer");
    let answer = l.sent.try_recv().expect("answer");
    s.session
        .handle_answer(description_of(&answer))
        .await
        .expect("answer applies");

    // Both turn their cameras on at once.
    let camera = Arc::new(tracks_for(MediaConstraints::camera()));
    s.session
        .update_tracks(Arc::clone(&camera))
        .await
        .expect("small renegotiates");
    l.session
        .update_tracks(Arc::clone(&camera))
        .await
        .expect("large renegotiates");
    let reoffer_s = s.sent.try_recv().expect("small re-offer");
    let reoffer_l = l.sent.try_recv().expect("large re-offer");

    assert!(s.session.handle_offer(description_of(&reoffer_l)).await.is_err());
    assert!(l.session.handle_offer(description_of(&reoffer_s)).await.is_err());
    assert_eq!(
        s.session.glare_resolution(),
        GlareResolution::Restart(Role::Offerer)
    );
    assert_eq!(
        l.session.glare_resolution(),
        GlareResolution::Restart(Role::Answerer)
    );

    let fresh = s.fresh_connection(1).await;
    s.session
        .replace_connection(fresh, 1, Role::Offerer)
        .await
        .expect("small restarts");
    let fresh = l.fresh_connection(1).await;
    l.session
        .replace_connection(fresh, 1, Role::Answerer)
        .await
        .expect("large restarts");
    assert_eq!(l.session.state(), NegotiationState::Idle);

    s.session.start_offer().await.expect("fresh offer");
    let fresh_offer = s.sent.try_recv().expect("fresh offer sent");
    assert_eq!(fresh_offer.kind, SignalKind::Offer);
    assert!(description_of(&fresh_offer).sdp.contains("video:cam-1"));

    l.session
        .handle_offer(description_of(&fresh_offer))
        .await
        .expect("large answers fresh offer");
    let answer = l.sent.try_recv().expect("answer");
    assert_eq!(answer.kind, SignalKind::Answer);
    s.session
        .handle_answer(description_of(&answer))
        .await
        .expect("answer applies");

    // The larger side's own change never got through, so it offers it now.
    let pending = l.sent.try_recv().expect("large re-offers its change");
    assert_eq!(pending.kind, SignalKind::Offer);
    assert!(description_of(&pending).sdp.contains("video:cam-1"));
    s.session
        .handle_offer(description_of(&pending))
        .await
        .expect("small answers");
    let answer = s.sent.try_recv().expect("answer from small");
    l.session
        .handle_answer(description_of(&answer))
        .await
        .expect("answer applies");

    for rig in [&s, &l] {
        assert_eq!(rig.session.state(), NegotiationState::Connected);
        assert!(!rig.session.has_pending_offer());
        assert_eq!(rig.connection.signaling_state(), SignalingState::Stable);
    }
    assert_eq!(s.session.role(), Role::Offerer);
    assert_eq!(l.session.role(), Role::Answerer);
}
