use meshcall_core::IceServerConfig;
use meshcall_core::utils::default_ice_servers;

/// Настройки relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// STUN/TURN, которые relay сообщает каждому участнику в `welcome`.
    pub ice_servers: Vec<IceServerConfig>,
    /// Ёмкость очереди команд одной комнаты.
    pub room_command_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            room_command_capacity: 100,
        }
    }
}
