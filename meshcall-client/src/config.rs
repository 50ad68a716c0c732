use crate::media::MediaConstraints;
use meshcall_core::IceServerConfig;
use meshcall_core::utils::default_ice_servers;

#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Используются, если relay не прислал свои ICE-серверы в `welcome`.
    pub ice_servers: Vec<IceServerConfig>,
    /// Что запросить у источника медиа при входе в комнату.
    pub initial_media: MediaConstraints,
    pub command_capacity: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            ice_servers: default_ice_servers(),
            initial_media: MediaConstraints::default(),
            command_capacity: 100,
        }
    }
}
