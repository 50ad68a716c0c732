use meshcall_core::{Frame, ParticipantId, SignalEnvelope};
use tokio::sync::mpsc;

/// Команды, поступающие в комнату от сигнального слоя (WebSocket).
#[derive(Debug)]
pub enum RoomCommand {
    /// Новое соединение. Комната отвечает снимком участников в `outbox`.
    Connect {
        participant_id: ParticipantId,
        outbox: mpsc::UnboundedSender<Frame>,
    },

    /// Адресный конверт (offer/answer/candidate) от участника `from`.
    Signal {
        from: ParticipantId,
        envelope: SignalEnvelope,
    },

    /// Соединение закрыто, явно или аварийно.
    Disconnect { participant_id: ParticipantId },
}
