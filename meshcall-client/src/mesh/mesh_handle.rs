use crate::error::MeshError;
use crate::media::{LocalTracks, MediaConstraints};
use crate::mesh::{MeshCommand, PeerSnapshot};
use meshcall_core::{ParticipantId, RoomId};
use tokio::sync::{mpsc, oneshot};

/// Дескриптор запущенного координатора. Клонируется свободно.
#[derive(Clone)]
pub struct MeshHandle {
    local_id: ParticipantId,
    room_id: RoomId,
    command_tx: mpsc::Sender<MeshCommand>,
}

impl MeshHandle {
    pub(crate) fn new(
        local_id: ParticipantId,
        room_id: RoomId,
        command_tx: mpsc::Sender<MeshCommand>,
    ) -> Self {
        Self {
            local_id,
            room_id,
            command_tx,
        }
    }

    pub fn local_id(&self) -> &ParticipantId {
        &self.local_id
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    /// Заменить локальные треки во всех сессиях.
    pub async fn update_local_tracks(&self, tracks: LocalTracks) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::UpdateLocalTracks { tracks, reply })
            .await?
    }

    /// Захватить новые источники и разослать их. При ошибке захвата
    /// остаются прежние треки.
    pub async fn switch_media(&self, constraints: MediaConstraints) -> Result<(), MeshError> {
        self.request(|reply| MeshCommand::SwitchMedia { constraints, reply })
            .await?
    }

    pub async fn set_track_enabled(
        &self,
        track_id: impl Into<String>,
        enabled: bool,
    ) -> Result<(), MeshError> {
        let track_id = track_id.into();
        self.request(|reply| MeshCommand::SetTrackEnabled {
            track_id,
            enabled,
            reply,
        })
        .await?
    }

    pub async fn peers(&self) -> Result<Vec<PeerSnapshot>, MeshError> {
        self.request(|reply| MeshCommand::Peers { reply }).await
    }

    /// Покинуть комнату. Повторный вызов ничего не делает.
    pub async fn leave(&self) -> Result<(), MeshError> {
        match self.request(|reply| MeshCommand::Leave { reply }).await {
            Ok(()) | Err(MeshError::Closed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> MeshCommand,
    ) -> Result<T, MeshError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| MeshError::Closed)?;
        reply_rx.await.map_err(|_| MeshError::Closed)
    }
}
