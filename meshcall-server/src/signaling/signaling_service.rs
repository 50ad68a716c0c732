use crate::config::RelayConfig;
use crate::room::RoomRegistry;
use crate::signaling::ws_handler;
use axum::Router;
use axum::routing::get;

#[derive(Clone)]
pub struct SignalingService {
    pub(crate) registry: RoomRegistry,
}

impl SignalingService {
    pub fn new(registry: RoomRegistry) -> Self {
        Self { registry }
    }

    pub fn with_config(config: RelayConfig) -> Self {
        Self::new(RoomRegistry::new(config))
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    /// Маршрут: `GET /ws/{room_id}` с апгрейдом до WebSocket.
    pub fn router(self) -> Router {
        Router::new()
            .route("/ws/{room_id}", get(ws_handler))
            .with_state(self)
    }
}
