use crate::connection::{ConnectionState, RemoteTrack};
use crate::session::{NegotiationState, Role};
use meshcall_core::ParticipantId;

/// Что видит приложение. Внутренности протокола сюда не попадают.
#[derive(Debug, Clone, PartialEq)]
pub enum MeshEvent {
    PeerJoined {
        participant: ParticipantId,
        role: Role,
    },
    PeerConnected {
        participant: ParticipantId,
    },
    /// Участник вышел из комнаты.
    PeerDisconnected {
        participant: ParticipantId,
    },
    /// Сессия с участником разобрана из-за ошибки. Остальные не затронуты.
    PeerFailed {
        participant: ParticipantId,
        reason: String,
    },
    RemoteTrack {
        participant: ParticipantId,
        track: RemoteTrack,
    },
    /// Потерян сигнальный канал, все сессии уже разобраны.
    RoomFailed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeerSnapshot {
    pub participant: ParticipantId,
    pub role: Role,
    pub state: NegotiationState,
    pub link_state: ConnectionState,
    pub remote_tracks: Vec<RemoteTrack>,
}
