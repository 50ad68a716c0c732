use crate::connection::{ConnectionState, PeerConnection, RemoteTrack};
use crate::error::MeshError;
use crate::media::LocalTracks;
use crate::session::{GlareResolution, NegotiationState, Role};
use meshcall_core::{IceCandidate, ParticipantId, SessionDescription, SignalEnvelope};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Сессия с одним удалённым участником: одно прямое соединение, его
/// согласование и маршрутизация треков.
///
/// Принадлежит координатору и вызывается только из его цикла, поэтому
/// все методы берут `&mut self` и не требуют блокировок.
pub struct PeerSession {
    local_id: ParticipantId,
    remote_id: ParticipantId,
    generation: u64,
    role: Role,
    state: NegotiationState,
    link_state: ConnectionState,
    connection: Arc<dyn PeerConnection>,
    local_tracks: Arc<LocalTracks>,
    local_described: bool,
    remote_described: bool,
    offer_pending: bool,
    offer_renegotiates: bool,
    renegotiation_needed: bool,
    pending_remote_candidates: VecDeque<IceCandidate>,
    pending_local_candidates: Vec<IceCandidate>,
    remote_tracks: Vec<RemoteTrack>,
    outbound: mpsc::UnboundedSender<SignalEnvelope>,
}

impl PeerSession {
    pub fn new(
        local_id: ParticipantId,
        remote_id: ParticipantId,
        generation: u64,
        role: Role,
        connection: Arc<dyn PeerConnection>,
        local_tracks: Arc<LocalTracks>,
        outbound: mpsc::UnboundedSender<SignalEnvelope>,
    ) -> Self {
        Self {
            local_id,
            remote_id,
            generation,
            role,
            state: NegotiationState::Idle,
            link_state: ConnectionState::New,
            connection,
            local_tracks,
            local_described: false,
            remote_described: false,
            offer_pending: false,
            offer_renegotiates: false,
            renegotiation_needed: false,
            pending_remote_candidates: VecDeque::new(),
            pending_local_candidates: Vec::new(),
            remote_tracks: Vec::new(),
            outbound,
        }
    }

    pub fn remote_id(&self) -> &ParticipantId {
        &self.remote_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> NegotiationState {
        self.state
    }

    pub fn link_state(&self) -> ConnectionState {
        self.link_state
    }

    pub fn remote_tracks(&self) -> &[RemoteTrack] {
        &self.remote_tracks
    }

    pub fn has_pending_offer(&self) -> bool {
        self.offer_pending
    }

    pub fn pending_remote_candidates(&self) -> usize {
        self.pending_remote_candidates.len()
    }

    /// Отдать соединению текущий набор локальных треков. Вызывается один раз
    /// при создании сессии.
    pub async fn attach_tracks(&mut self) -> Result<(), MeshError> {
        self.connection
            .set_tracks(&self.local_tracks)
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))
    }

    /// Отправить offer. Не больше одного неподтверждённого offer за раз.
    pub async fn start_offer(&mut self) -> Result<(), MeshError> {
        if self.state.is_terminal() || self.offer_pending {
            return Ok(());
        }

        let offer = self
            .connection
            .create_offer()
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;
        self.connection
            .set_local_description(offer.clone())
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;

        self.local_described = true;
        self.offer_pending = true;
        self.offer_renegotiates = self.state == NegotiationState::Connected;
        if self.state == NegotiationState::Idle {
            self.state = NegotiationState::OfferSent;
        }

        debug!("Sending offer to {}", self.remote_id);
        self.send(SignalEnvelope::description(
            self.local_id.clone(),
            self.remote_id.clone(),
            &offer,
        ));
        self.flush_local_candidates();
        Ok(())
    }

    /// Входящий offer: применить, ответить.
    ///
    /// При своём неподтверждённом offer возвращает `GlareConflict`, не трогая
    /// соединение. Как поступить дальше, говорит [`Self::glare_resolution`].
    pub async fn handle_offer(&mut self, offer: SessionDescription) -> Result<(), MeshError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if self.offer_pending {
            return Err(MeshError::GlareConflict(self.remote_id.clone()));
        }

        let announced = announced_track_ids(&offer.sdp);
        self.connection
            .set_remote_description(offer)
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;
        self.remote_described = true;
        self.retain_remote_tracks(&announced);
        if self.state == NegotiationState::Idle {
            self.state = NegotiationState::RemoteDescribed;
        }
        self.flush_remote_candidates().await;

        let answer = self
            .connection
            .create_answer()
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;
        self.connection
            .set_local_description(answer.clone())
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;
        self.local_described = true;

        debug!("Sending answer to {}", self.remote_id);
        self.send(SignalEnvelope::description(
            self.local_id.clone(),
            self.remote_id.clone(),
            &answer,
        ));
        self.flush_local_candidates();
        self.enter_connected();

        self.renegotiate_if_needed().await
    }

    pub async fn handle_answer(&mut self, answer: SessionDescription) -> Result<(), MeshError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if !self.offer_pending {
            warn!("Ignoring answer from {} without an outstanding offer", self.remote_id);
            return Ok(());
        }

        let announced = announced_track_ids(&answer.sdp);
        self.connection
            .set_remote_description(answer)
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;
        self.offer_pending = false;
        self.remote_described = true;
        self.retain_remote_tracks(&announced);
        self.flush_remote_candidates().await;
        self.enter_connected();

        self.renegotiate_if_needed().await
    }

    /// Кандидат до применения удалённого описания ставится в очередь.
    pub async fn handle_remote_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_terminal() {
            return;
        }
        if !self.remote_described {
            self.pending_remote_candidates.push_back(candidate);
            return;
        }
        self.add_remote_candidate(candidate).await;
    }

    /// Кандидат уходит удалённой стороне только после установки локального описания.
    pub fn handle_local_candidate(&mut self, candidate: IceCandidate) {
        if self.state.is_terminal() {
            return;
        }
        if !self.local_described {
            self.pending_local_candidates.push(candidate);
            return;
        }
        self.send(SignalEnvelope::candidate(
            self.local_id.clone(),
            self.remote_id.clone(),
            &candidate,
        ));
    }

    /// Заменить локальные треки. Если изменился состав треков, сторона
    /// становится временным offerer. Смена одного лишь флага `enabled`
    /// повторного согласования не требует.
    pub async fn update_tracks(&mut self, tracks: Arc<LocalTracks>) -> Result<(), MeshError> {
        if self.state.is_terminal() {
            return Ok(());
        }

        let changed = !self.local_tracks.same_tracks(&tracks);
        self.local_tracks = tracks;
        self.connection
            .set_tracks(&self.local_tracks)
            .await
            .map_err(|e| MeshError::negotiation(&self.remote_id, e))?;

        if changed {
            self.renegotiation_needed = true;
            self.renegotiate_if_needed().await?;
        }
        Ok(())
    }

    /// Трек с тем же id заменяет прежний. Возвращает `false`, если такой
    /// трек уже известен.
    pub fn add_remote_track(&mut self, track: RemoteTrack) -> bool {
        if self.remote_tracks.contains(&track) {
            return false;
        }
        self.remote_tracks.retain(|t| t.id != track.id);
        self.remote_tracks.push(track);
        true
    }

    /// Уступает больший идентификатор. Во время повторного согласования
    /// соединение пересоздают обе стороны.
    pub fn glare_resolution(&self) -> GlareResolution {
        let local_yields = self.local_id > self.remote_id;
        if self.state == NegotiationState::Connected {
            let role = if local_yields {
                Role::Answerer
            } else {
                Role::Offerer
            };
            return GlareResolution::Restart(role);
        }
        if local_yields {
            GlareResolution::Yield
        } else {
            GlareResolution::KeepLocal
        }
    }

    /// Закрыть текущее соединение и начать согласование заново на `connection`
    /// с ролью `role`. События прежнего поколения после этого отбрасываются.
    ///
    /// Отвечающая сторона повторно предложит свои треки после answer, если
    /// её изменение так и не было согласовано.
    pub async fn replace_connection(
        &mut self,
        connection: Arc<dyn PeerConnection>,
        generation: u64,
        role: Role,
    ) -> Result<(), MeshError> {
        if self.state.is_terminal() {
            return Ok(());
        }
        if let Err(e) = self.connection.close().await {
            debug!("Closing replaced connection to {}: {}", self.remote_id, e);
        }

        self.renegotiation_needed = match role {
            Role::Answerer => self.renegotiation_needed || self.offer_renegotiates,
            Role::Offerer => false,
        };
        self.connection = connection;
        self.generation = generation;
        self.role = role;
        self.state = NegotiationState::Idle;
        self.link_state = ConnectionState::New;
        self.local_described = false;
        self.remote_described = false;
        self.offer_pending = false;
        self.offer_renegotiates = false;
        self.pending_remote_candidates.clear();
        self.pending_local_candidates.clear();
        self.remote_tracks.clear();

        info!(
            "Session with {} restarted as {} (generation {})",
            self.remote_id, role, generation
        );
        self.attach_tracks().await
    }

    /// Возвращает `true`, если соединение впервые стало `Connected`.
    pub fn set_link_state(&mut self, state: ConnectionState) -> bool {
        let became_connected =
            state == ConnectionState::Connected && self.link_state != ConnectionState::Connected;
        self.link_state = state;
        became_connected
    }

    pub async fn close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = NegotiationState::Closed;
        self.release().await;
        info!("Session with {} closed", self.remote_id);
    }

    pub async fn fail(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = NegotiationState::Failed;
        self.release().await;
        warn!("Session with {} failed", self.remote_id);
    }

    async fn release(&mut self) {
        self.pending_remote_candidates.clear();
        self.pending_local_candidates.clear();
        self.offer_pending = false;
        self.renegotiation_needed = false;
        self.remote_tracks.clear();
        if let Err(e) = self.connection.close().await {
            debug!("Closing connection to {}: {}", self.remote_id, e);
        }
    }

    async fn renegotiate_if_needed(&mut self) -> Result<(), MeshError> {
        if !self.renegotiation_needed
            || self.offer_pending
            || self.state != NegotiationState::Connected
        {
            return Ok(());
        }
        self.renegotiation_needed = false;
        debug!("Renegotiating with {}", self.remote_id);
        self.start_offer().await
    }

    fn enter_connected(&mut self) {
        if self.state != NegotiationState::Connected {
            info!("Session with {} negotiated as {}", self.remote_id, self.role);
            self.state = NegotiationState::Connected;
        }
    }

    fn retain_remote_tracks(&mut self, announced: &HashSet<String>) {
        let before = self.remote_tracks.len();
        self.remote_tracks.retain(|t| announced.contains(&t.id));
        if self.remote_tracks.len() != before {
            debug!(
                "{} stopped sending {} track(s)",
                self.remote_id,
                before - self.remote_tracks.len()
            );
        }
    }

    async fn flush_remote_candidates(&mut self) {
        while let Some(candidate) = self.pending_remote_candidates.pop_front() {
            self.add_remote_candidate(candidate).await;
        }
    }

    fn flush_local_candidates(&mut self) {
        for candidate in std::mem::take(&mut self.pending_local_candidates) {
            self.send(SignalEnvelope::candidate(
                self.local_id.clone(),
                self.remote_id.clone(),
                &candidate,
            ));
        }
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) {
        if let Err(e) = self.connection.add_ice_candidate(candidate).await {
            warn!("Rejected candidate from {}: {}", self.remote_id, e);
        }
    }

    fn send(&self, envelope: SignalEnvelope) {
        if self.outbound.send(envelope).is_err() {
            debug!("Signaling channel closed, dropping message to {}", self.remote_id);
        }
    }
}

/// Треки, которые удалённая сторона объявила в описании: `a=msid:<stream> <track>`.
fn announced_track_ids(sdp: &str) -> HashSet<String> {
    sdp.lines()
        .filter_map(|line| line.trim().strip_prefix("a=msid:"))
        .filter_map(|value| value.split_whitespace().nth(1))
        .map(str::to_owned)
        .collect()
}
