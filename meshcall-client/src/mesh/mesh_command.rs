use crate::error::MeshError;
use crate::media::{LocalTracks, MediaConstraints};
use crate::mesh::PeerSnapshot;
use tokio::sync::oneshot;

/// Запросы от `MeshHandle` к циклу координатора.
pub(crate) enum MeshCommand {
    UpdateLocalTracks {
        tracks: LocalTracks,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },
    SwitchMedia {
        constraints: MediaConstraints,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },
    SetTrackEnabled {
        track_id: String,
        enabled: bool,
        reply: oneshot::Sender<Result<(), MeshError>>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerSnapshot>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}
