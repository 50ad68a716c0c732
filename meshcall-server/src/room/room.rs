use crate::config::RelayConfig;
use crate::room::room_command::RoomCommand;
use meshcall_core::{Frame, ParticipantId, RoomId, SignalEnvelope, Welcome};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Актор комнаты. Членство в комнате это ровно множество открытых соединений.
///
/// Все команды обрабатываются последовательно, поэтому снимок участников в
/// `welcome` и последующие `join`/`leave` упорядочены версией членства.
pub struct Room {
    room_id: RoomId,
    members: HashMap<ParticipantId, mpsc::UnboundedSender<Frame>>,
    version: u64,
    command_rx: mpsc::Receiver<RoomCommand>,
    config: Arc<RelayConfig>,
}

impl Room {
    pub fn new(
        room_id: RoomId,
        command_rx: mpsc::Receiver<RoomCommand>,
        config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            room_id,
            members: HashMap::new(),
            version: 0,
            command_rx,
            config,
        }
    }

    pub async fn run(mut self) {
        info!("Room {} event loop started", self.room_id);

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }

        info!("Command channel closed. Room {} shut down.", self.room_id);
    }

    fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Connect {
                participant_id,
                outbox,
            } => self.connect(participant_id, outbox),

            RoomCommand::Signal { from, envelope } => self.relay(from, envelope),

            RoomCommand::Disconnect { participant_id } => self.disconnect(&participant_id),
        }
    }

    fn connect(&mut self, participant_id: ParticipantId, outbox: mpsc::UnboundedSender<Frame>) {
        if self.members.contains_key(&participant_id) {
            warn!(
                "Participant {} connected twice to room {}, dropping the old connection",
                participant_id, self.room_id
            );
            self.disconnect(&participant_id);
        }

        let mut members: Vec<ParticipantId> = self.members.keys().cloned().collect();
        members.sort();

        let version = self.version + 1;
        let welcome = Welcome {
            participant: participant_id.clone(),
            room: self.room_id.clone(),
            members,
            version,
            ice_servers: self.config.ice_servers.clone(),
        };

        if outbox.send(Frame::Welcome(welcome)).is_err() {
            warn!(
                "Participant {} went away before welcome in room {}",
                participant_id, self.room_id
            );
            return;
        }

        self.version = version;
        self.broadcast(SignalEnvelope::join(participant_id.clone(), version));
        self.members.insert(participant_id.clone(), outbox);

        info!(
            "Participant {} joined room {} ({} members, version {})",
            participant_id,
            self.room_id,
            self.members.len(),
            self.version
        );
    }

    fn relay(&self, from: ParticipantId, envelope: SignalEnvelope) {
        if !self.members.contains_key(&from) {
            warn!("Dropping {} from non-member {}", envelope.kind, from);
            return;
        }
        if envelope.kind.is_broadcast() {
            warn!("Dropping client-sent {} from {}", envelope.kind, from);
            return;
        }
        let Some(to) = envelope.to.clone() else {
            warn!("Dropping {} from {} without recipient", envelope.kind, from);
            return;
        };
        let Some(target) = self.members.get(&to) else {
            warn!(
                "Dropping {} from {} addressed to non-member {}",
                envelope.kind, from, to
            );
            return;
        };

        debug!("Relaying {} {} -> {}", envelope.kind, from, to);

        // Отправитель всегда тот, за кем закреплено соединение.
        let envelope = SignalEnvelope { from, ..envelope };
        if target.send(Frame::Signal(envelope)).is_err() {
            debug!("Recipient {} is already gone", to);
        }
    }

    fn disconnect(&mut self, participant_id: &ParticipantId) {
        if self.members.remove(participant_id).is_none() {
            return;
        }

        self.version += 1;
        self.broadcast(SignalEnvelope::leave(participant_id.clone(), self.version));

        info!(
            "Participant {} left room {} ({} members, version {})",
            participant_id,
            self.room_id,
            self.members.len(),
            self.version
        );
    }

    fn broadcast(&self, envelope: SignalEnvelope) {
        for (id, outbox) in &self.members {
            if id == &envelope.from {
                continue;
            }
            if outbox.send(Frame::Signal(envelope.clone())).is_err() {
                debug!("Broadcast target {} is already gone", id);
            }
        }
    }
}
