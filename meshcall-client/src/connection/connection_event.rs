use crate::media::TrackKind;
use meshcall_core::{IceCandidate, ParticipantId};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// Входящий трек удалённого участника.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTrack {
    pub id: String,
    pub stream_id: String,
    pub kind: TrackKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEventKind {
    /// Собран локальный ICE-кандидат, его нужно переслать удалённой стороне.
    LocalCandidate(IceCandidate),
    StateChanged(ConnectionState),
    RemoteTrack(RemoteTrack),
}

/// Событие соединения для диспетчера координатора.
///
/// `generation` отличает соединение от его предшественников с тем же
/// участником: события от уже разобранной сессии отбрасываются.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub remote: ParticipantId,
    pub generation: u64,
    pub kind: ConnectionEventKind,
}

/// Отправитель событий, который получает реализация соединения.
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    remote: ParticipantId,
    generation: u64,
    tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ConnectionEvents {
    pub fn new(
        remote: ParticipantId,
        generation: u64,
        tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> Self {
        Self {
            remote,
            generation,
            tx,
        }
    }

    pub fn remote(&self) -> &ParticipantId {
        &self.remote
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Не ждёт координатора: колбэки соединения срабатывают и внутри
    /// вызовов, которые координатор сам ожидает.
    ///
    /// Ошибка отправки означает, что координатор уже остановлен.
    pub fn emit(&self, kind: ConnectionEventKind) {
        let event = ConnectionEvent {
            remote: self.remote.clone(),
            generation: self.generation,
            kind,
        };
        let _ = self.tx.send(event);
    }
}
