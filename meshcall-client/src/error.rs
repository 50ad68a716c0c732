use meshcall_core::{DecodeError, ParticipantId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshError {
    /// Потерян сигнальный канал. Вся сетка комнаты разобрана.
    #[error("signaling transport failed: {0}")]
    Transport(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Обе стороны отправили offer. Разрешается внутри, наружу не выходит.
    #[error("glare with {0}")]
    GlareConflict(ParticipantId),

    #[error("negotiation with {peer} failed: {reason}")]
    Negotiation {
        peer: ParticipantId,
        reason: String,
    },

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("unknown local track '{0}'")]
    UnknownTrack(String),

    #[error("mesh coordinator has already left the room")]
    Closed,
}

impl MeshError {
    pub(crate) fn negotiation(peer: &ParticipantId, err: impl std::fmt::Display) -> Self {
        Self::Negotiation {
            peer: peer.clone(),
            reason: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AcquisitionError {
    #[error("media device not found: {0}")]
    DeviceNotFound(String),

    #[error("permission to capture media was denied")]
    PermissionDenied,

    #[error("media source unavailable: {0}")]
    Unavailable(String),
}
