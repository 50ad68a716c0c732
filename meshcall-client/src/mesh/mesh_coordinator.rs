use crate::config::MeshConfig;
use crate::connection::{
    ConnectionEvent, ConnectionEventKind, ConnectionEvents, ConnectionFactory, ConnectionState,
};
use crate::error::{AcquisitionError, MeshError};
use crate::media::{LocalTracks, MediaSource};
use crate::mesh::{MeshCommand, MeshEvent, MeshHandle, PeerSnapshot};
use crate::session::{GlareResolution, PeerSession, Role};
use crate::signaling::SignalingConnector;
use meshcall_core::{
    IceCandidate, IceServerConfig, ParticipantId, RoomId, SdpKind, SessionDescription,
    SignalEnvelope, SignalKind,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Результат входа в комнату.
pub struct JoinedMesh {
    pub handle: MeshHandle,
    pub events: mpsc::UnboundedReceiver<MeshEvent>,
    pub local_id: ParticipantId,
    /// Начальное медиа захватить не удалось, вход выполнен без треков.
    pub media_error: Option<AcquisitionError>,
}

/// Владелец всех сессий участника в одной комнате.
///
/// Входящие конверты, команды и события соединений проходят через один
/// цикл, поэтому карта сессий не требует блокировок.
pub struct MeshCoordinator {
    room_id: RoomId,
    local_id: ParticipantId,
    ice_servers: Vec<IceServerConfig>,
    sessions: HashMap<ParticipantId, PeerSession>,
    local_tracks: Arc<LocalTracks>,
    membership_version: u64,
    next_generation: u64,
    outbound: Option<mpsc::UnboundedSender<SignalEnvelope>>,
    inbound: mpsc::UnboundedReceiver<SignalEnvelope>,
    command_rx: mpsc::Receiver<MeshCommand>,
    connection_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
    connection_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_tx: mpsc::UnboundedSender<MeshEvent>,
    factory: Arc<dyn ConnectionFactory>,
    media: Arc<dyn MediaSource>,
    left: bool,
}

impl MeshCoordinator {
    /// Войти в комнату: захватить медиа, открыть сигнальный канал и
    /// запустить цикл координатора.
    ///
    /// Ошибка захвата медиа не мешает входу и возвращается в `media_error`.
    pub async fn join(
        room_id: RoomId,
        config: MeshConfig,
        connector: &dyn SignalingConnector,
        factory: Arc<dyn ConnectionFactory>,
        media: Arc<dyn MediaSource>,
    ) -> Result<JoinedMesh, MeshError> {
        let (local_tracks, media_error) = match media.acquire(config.initial_media).await {
            Ok(tracks) => (tracks, None),
            Err(e) => {
                warn!("Joining {} without local media: {}", room_id, e);
                (LocalTracks::empty(), Some(e))
            }
        };

        let link = match connector.connect(&room_id).await {
            Ok(link) => link,
            Err(e) => {
                media.release(&local_tracks).await;
                return Err(e);
            }
        };

        let welcome = link.welcome;
        if welcome.room != room_id {
            warn!("Relay welcomed us into {} instead of {}", welcome.room, room_id);
        }
        let local_id = welcome.participant.clone();
        let ice_servers = if welcome.ice_servers.is_empty() {
            config.ice_servers
        } else {
            welcome.ice_servers
        };

        let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let coordinator = Self {
            room_id: room_id.clone(),
            local_id: local_id.clone(),
            ice_servers,
            sessions: HashMap::new(),
            local_tracks: Arc::new(local_tracks),
            membership_version: welcome.version,
            next_generation: 0,
            outbound: Some(link.outbound),
            inbound: link.inbound,
            command_rx,
            connection_rx,
            connection_tx,
            events_tx,
            factory,
            media,
            left: false,
        };

        tokio::spawn(coordinator.run(welcome.members));

        Ok(JoinedMesh {
            handle: MeshHandle::new(local_id.clone(), room_id, command_tx),
            events: events_rx,
            local_id,
            media_error,
        })
    }

    async fn run(mut self, members: Vec<ParticipantId>) {
        info!(
            "Mesh for {} in room {} started with {} members",
            self.local_id,
            self.room_id,
            members.len()
        );

        // Новичок предлагает соединение всем, кто уже в комнате.
        for member in members {
            self.open_session(member, Role::Offerer).await;
        }

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(c) => {
                            if !self.handle_command(c).await {
                                break;
                            }
                        }
                        None => {
                            debug!("All mesh handles dropped, leaving {}", self.room_id);
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                envelope = self.inbound.recv() => {
                    match envelope {
                        Some(e) => self.dispatch(e).await,
                        None => {
                            self.fail_room("signaling channel closed").await;
                            break;
                        }
                    }
                }

                Some(event) = self.connection_rx.recv() => {
                    self.handle_connection_event(event).await;
                }
            }
        }

        info!("Mesh for {} in room {} stopped", self.local_id, self.room_id);
    }

    /// Возвращает `false`, когда цикл нужно остановить.
    async fn handle_command(&mut self, cmd: MeshCommand) -> bool {
        match cmd {
            MeshCommand::UpdateLocalTracks { tracks, reply } => {
                self.apply_local_tracks(tracks).await;
                let _ = reply.send(Ok(()));
            }

            MeshCommand::SwitchMedia { constraints, reply } => {
                let result = match self.media.acquire(constraints).await {
                    Ok(tracks) => {
                        let previous = Arc::clone(&self.local_tracks);
                        self.apply_local_tracks(tracks).await;
                        self.media.release(&previous).await;
                        Ok(())
                    }
                    Err(e) => {
                        warn!("Media switch failed, keeping current tracks: {}", e);
                        Err(MeshError::Acquisition(e))
                    }
                };
                let _ = reply.send(result);
            }

            MeshCommand::SetTrackEnabled {
                track_id,
                enabled,
                reply,
            } => {
                let result = match self.local_tracks.with_enabled(&track_id, enabled) {
                    Some(tracks) => {
                        self.apply_local_tracks(tracks).await;
                        Ok(())
                    }
                    None => Err(MeshError::UnknownTrack(track_id)),
                };
                let _ = reply.send(result);
            }

            MeshCommand::Peers { reply } => {
                let _ = reply.send(self.snapshot());
            }

            MeshCommand::Leave { reply } => {
                self.shutdown().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn dispatch(&mut self, envelope: SignalEnvelope) {
        if envelope.from == self.local_id {
            debug!("Ignoring own {} echoed by relay", envelope.kind);
            return;
        }
        if let Some(to) = &envelope.to
            && to != &self.local_id
        {
            warn!("Dropping {} addressed to {}", envelope.kind, to);
            return;
        }

        let from = envelope.from.clone();
        match envelope.kind {
            SignalKind::Join => {
                if self.accept_membership(&envelope) {
                    self.on_remote_joined(from).await;
                }
            }

            SignalKind::Leave => {
                if self.accept_membership(&envelope) {
                    self.on_remote_left(&from).await;
                }
            }

            SignalKind::Offer => {
                let Some(offer) = parse_description(&envelope.payload, SdpKind::Offer) else {
                    warn!("Dropping malformed offer from {}", from);
                    return;
                };
                // Offer может обогнать join того же участника.
                if !self.sessions.contains_key(&from) {
                    self.open_session(from.clone(), Role::Answerer).await;
                }
                let result = self.apply_offer(&from, offer).await;
                self.settle(&from, result).await;
            }

            SignalKind::Answer => {
                let Some(answer) = parse_description(&envelope.payload, SdpKind::Answer) else {
                    warn!("Dropping malformed answer from {}", from);
                    return;
                };
                let result = match self.sessions.get_mut(&from) {
                    Some(session) => session.handle_answer(answer).await,
                    None => {
                        debug!("Answer from {} without a session", from);
                        return;
                    }
                };
                self.settle(&from, result).await;
            }

            SignalKind::Candidate => {
                let Ok(candidate) = serde_json::from_value::<IceCandidate>(envelope.payload)
                else {
                    warn!("Dropping malformed candidate from {}", from);
                    return;
                };
                match self.sessions.get_mut(&from) {
                    Some(session) => session.handle_remote_candidate(candidate).await,
                    None => debug!("Candidate from {} without a session", from),
                }
            }
        }
    }

    /// Создаёт сессию, если её ещё нет.
    async fn on_remote_joined(&mut self, participant: ParticipantId) {
        if self.sessions.contains_key(&participant) {
            debug!("Session with {} already exists", participant);
            return;
        }
        self.open_session(participant, Role::Answerer).await;
    }

    async fn on_remote_left(&mut self, participant: &ParticipantId) {
        let Some(mut session) = self.sessions.remove(participant) else {
            debug!("Leave for {} without a session", participant);
            return;
        };
        session.close().await;
        self.emit(MeshEvent::PeerDisconnected {
            participant: participant.clone(),
        });
    }

    async fn open_session(&mut self, participant: ParticipantId, role: Role) {
        if participant == self.local_id || self.sessions.contains_key(&participant) {
            return;
        }
        let Some(outbound) = self.outbound.clone() else {
            return;
        };

        let generation = self.take_generation();
        let events = ConnectionEvents::new(
            participant.clone(),
            generation,
            self.connection_tx.clone(),
        );
        let connection = match self.factory.create(&self.ice_servers, events).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to create connection to {}: {}", participant, e);
                self.emit(MeshEvent::PeerFailed {
                    participant,
                    reason: e.to_string(),
                });
                return;
            }
        };

        info!("Opening session with {} as {}", participant, role);
        let session = PeerSession::new(
            self.local_id.clone(),
            participant.clone(),
            generation,
            role,
            connection,
            Arc::clone(&self.local_tracks),
            outbound,
        );
        self.sessions.insert(participant.clone(), session);
        self.emit(MeshEvent::PeerJoined {
            participant: participant.clone(),
            role,
        });

        let result = match self.sessions.get_mut(&participant) {
            Some(session) => match session.attach_tracks().await {
                Ok(()) if role == Role::Offerer => session.start_offer().await,
                other => other,
            },
            None => return,
        };
        self.settle(&participant, result).await;
    }

    async fn apply_offer(
        &mut self,
        participant: &ParticipantId,
        offer: SessionDescription,
    ) -> Result<(), MeshError> {
        let Some(session) = self.sessions.get_mut(participant) else {
            return Ok(());
        };
        match session.handle_offer(offer.clone()).await {
            Err(MeshError::GlareConflict(_)) => self.resolve_glare(participant, offer).await,
            other => other,
        }
    }

    /// Встречные offer. Наружу не выходят ни при каком исходе.
    async fn resolve_glare(
        &mut self,
        participant: &ParticipantId,
        offer: SessionDescription,
    ) -> Result<(), MeshError> {
        let Some(resolution) = self.sessions.get(participant).map(PeerSession::glare_resolution)
        else {
            return Ok(());
        };

        match resolution {
            GlareResolution::KeepLocal => {
                debug!("Glare with {}: keeping local offer", participant);
                Ok(())
            }
            GlareResolution::Yield => {
                debug!("Glare with {}: yielding on a fresh connection", participant);
                self.replace_connection(participant, Role::Answerer).await?;
                match self.sessions.get_mut(participant) {
                    Some(session) => session.handle_offer(offer).await,
                    None => Ok(()),
                }
            }
            GlareResolution::Restart(role) => {
                debug!("Glare with {} while renegotiating: restarting as {}", participant, role);
                self.replace_connection(participant, role).await?;
                match self.sessions.get_mut(participant) {
                    Some(session) if role == Role::Offerer => session.start_offer().await,
                    _ => Ok(()),
                }
            }
        }
    }

    async fn replace_connection(
        &mut self,
        participant: &ParticipantId,
        role: Role,
    ) -> Result<(), MeshError> {
        let generation = self.take_generation();
        let events = ConnectionEvents::new(
            participant.clone(),
            generation,
            self.connection_tx.clone(),
        );
        let connection = self
            .factory
            .create(&self.ice_servers, events)
            .await
            .map_err(|e| MeshError::negotiation(participant, e))?;
        match self.sessions.get_mut(participant) {
            Some(session) => session.replace_connection(connection, generation, role).await,
            None => Ok(()),
        }
    }

    fn take_generation(&mut self) -> u64 {
        let generation = self.next_generation;
        self.next_generation += 1;
        generation
    }

    async fn handle_connection_event(&mut self, event: ConnectionEvent) {
        let Some(session) = self.sessions.get_mut(&event.remote) else {
            debug!("Event for defunct session with {}", event.remote);
            return;
        };
        if session.generation() != event.generation {
            debug!(
                "Stale event for {} (generation {} != {})",
                event.remote,
                event.generation,
                session.generation()
            );
            return;
        }

        match event.kind {
            ConnectionEventKind::LocalCandidate(candidate) => {
                session.handle_local_candidate(candidate);
            }

            ConnectionEventKind::RemoteTrack(track) => {
                if session.add_remote_track(track.clone()) {
                    self.emit(MeshEvent::RemoteTrack {
                        participant: event.remote,
                        track,
                    });
                }
            }

            ConnectionEventKind::StateChanged(state) => {
                let became_connected = session.set_link_state(state);
                match state {
                    ConnectionState::Connected if became_connected => {
                        info!("Connected to {}", event.remote);
                        self.emit(MeshEvent::PeerConnected {
                            participant: event.remote,
                        });
                    }
                    ConnectionState::Disconnected | ConnectionState::Failed => {
                        let reason = format!("connection {:?}", state).to_lowercase();
                        self.fail_session(&event.remote, reason).await;
                    }
                    _ => {}
                }
            }
        }
    }

    async fn apply_local_tracks(&mut self, tracks: LocalTracks) {
        self.local_tracks = Arc::new(tracks);

        let participants: Vec<ParticipantId> = self.sessions.keys().cloned().collect();
        for participant in participants {
            let result = match self.sessions.get_mut(&participant) {
                Some(session) => session.update_tracks(Arc::clone(&self.local_tracks)).await,
                None => continue,
            };
            self.settle(&participant, result).await;
        }
    }

    /// Ошибка одной сессии разбирает только её.
    async fn settle(&mut self, participant: &ParticipantId, result: Result<(), MeshError>) {
        match result {
            Ok(()) => {}
            Err(e) => {
                warn!("Session with {} failed: {}", participant, e);
                self.fail_session(participant, e.to_string()).await;
            }
        }
    }

    async fn fail_session(&mut self, participant: &ParticipantId, reason: String) {
        let Some(mut session) = self.sessions.remove(participant) else {
            return;
        };
        session.fail().await;
        self.emit(MeshEvent::PeerFailed {
            participant: participant.clone(),
            reason,
        });
    }

    /// Штатный выход. Единственный путь освобождения ресурсов.
    async fn shutdown(&mut self) {
        if self.left {
            return;
        }
        self.left = true;

        for (_, mut session) in self.sessions.drain() {
            session.close().await;
        }

        if let Some(outbound) = self.outbound.take() {
            let _ = outbound.send(SignalEnvelope::leave(
                self.local_id.clone(),
                self.membership_version,
            ));
        }

        self.media.release(&self.local_tracks).await;
        info!("{} left room {}", self.local_id, self.room_id);
    }

    async fn fail_room(&mut self, reason: &str) {
        if self.left {
            return;
        }
        error!("Room {} failed: {}", self.room_id, reason);
        self.left = true;

        for (_, mut session) in self.sessions.drain() {
            session.close().await;
        }
        self.outbound = None;
        self.media.release(&self.local_tracks).await;

        self.emit(MeshEvent::RoomFailed {
            reason: reason.to_owned(),
        });
    }

    fn accept_membership(&mut self, envelope: &SignalEnvelope) -> bool {
        let Some(version) = envelope.membership_version() else {
            return true;
        };
        if version <= self.membership_version {
            debug!(
                "Ignoring stale {} for {} (version {} <= {})",
                envelope.kind, envelope.from, version, self.membership_version
            );
            return false;
        }
        self.membership_version = version;
        true
    }

    fn snapshot(&self) -> Vec<PeerSnapshot> {
        let mut peers: Vec<PeerSnapshot> = self
            .sessions
            .values()
            .map(|s| PeerSnapshot {
                participant: s.remote_id().clone(),
                role: s.role(),
                state: s.state(),
                link_state: s.link_state(),
                remote_tracks: s.remote_tracks().to_vec(),
            })
            .collect();
        peers.sort_by(|a, b| a.participant.cmp(&b.participant));
        peers
    }

    fn emit(&self, event: MeshEvent) {
        let _ = self.events_tx.send(event);
    }
}

fn parse_description(payload: &Value, expected: SdpKind) -> Option<SessionDescription> {
    serde_json::from_value::<SessionDescription>(payload.clone())
        .ok()
        .filter(|desc| desc.kind == expected)
}
