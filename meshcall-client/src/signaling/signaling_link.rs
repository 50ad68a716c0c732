use crate::error::MeshError;
use async_trait::async_trait;
use meshcall_core::{RoomId, SignalEnvelope, Welcome};
use tokio::sync::mpsc;

/// Открытый сигнальный канал одного участника.
///
/// Закрытие `inbound` означает потерю транспорта. Сброс `outbound`
/// закрывает канал со стороны клиента.
pub struct SignalingLink {
    pub welcome: Welcome,
    pub outbound: mpsc::UnboundedSender<SignalEnvelope>,
    pub inbound: mpsc::UnboundedReceiver<SignalEnvelope>,
}

#[async_trait]
pub trait SignalingConnector: Send + Sync {
    async fn connect(&self, room_id: &RoomId) -> Result<SignalingLink, MeshError>;
}
