use crate::config::RelayConfig;
use crate::room::{Room, RoomCommand};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use meshcall_core::RoomId;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

struct RoomEntry {
    sender: mpsc::Sender<RoomCommand>,
    attached: usize,
}

/// Реестр комнат relay.
///
/// Комната создаётся при первом `attach` и убирается из реестра при последнем
/// `detach`. Актор комнаты завершается, когда отпущены все её отправители.
#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<RoomId, RoomEntry>>,
    config: Arc<RelayConfig>,
}

impl RoomRegistry {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            config: Arc::new(config),
        }
    }

    /// Регистрирует ещё одно соединение в комнате и возвращает её канал команд.
    pub fn attach(&self, room_id: &RoomId) -> mpsc::Sender<RoomCommand> {
        let mut entry = self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating new room: {}", room_id);
            let (tx, rx) = mpsc::channel(self.config.room_command_capacity);

            let room = Room::new(room_id.clone(), rx, self.config.clone());
            tokio::spawn(room.run());

            RoomEntry {
                sender: tx,
                attached: 0,
            }
        });

        entry.attached += 1;
        entry.sender.clone()
    }

    pub fn detach(&self, room_id: &RoomId) {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.clone()) else {
            return;
        };

        let remaining = entry.get().attached.saturating_sub(1);
        entry.get_mut().attached = remaining;
        if remaining == 0 {
            entry.remove();
            info!("Last connection left, releasing room: {}", room_id);
        }
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
