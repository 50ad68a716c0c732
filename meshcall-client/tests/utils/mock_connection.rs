use anyhow::{Result, bail};
use async_trait::async_trait;
use meshcall_client::connection::{
    ConnectionEventKind, ConnectionEvents, ConnectionFactory, ConnectionState, PeerConnection,
    RemoteTrack,
};
use meshcall_client::media::{LocalTracks, TrackKind};
use meshcall_core::{IceCandidate, IceServerConfig, ParticipantId, SdpKind, SessionDescription};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalingState {
    Stable,
    HaveLocalOffer,
    HaveRemoteOffer,
}

#[derive(Debug)]
struct MockState {
    signaling: SignalingState,
    local_set: bool,
    remote_set: bool,
    connected_emitted: bool,
    closed: usize,
    offers: usize,
    answers: usize,
    candidates_added: Vec<IceCandidate>,
    tracks: LocalTracks,
    remote_sdps: Vec<String>,
}

/// Connection primitive with the signaling-state rules of a real peer
/// connection and no rollback. The SDP is a readable header
/// `mock-<type>;n=<k>;stream=<id>;tracks=<kind>:<id>,...` followed by one
/// `a=msid:<stream> <id>` line per track.
pub struct MockConnection {
    pub remote: ParticipantId,
    pub generation: u64,
    label: String,
    incompatible: bool,
    candidate_burst: usize,
    events: ConnectionEvents,
    state: Mutex<MockState>,
}

impl MockConnection {
    fn new(
        label: String,
        incompatible: bool,
        candidate_burst: usize,
        events: ConnectionEvents,
    ) -> Self {
        Self {
            remote: events.remote().clone(),
            generation: events.generation(),
            label,
            incompatible,
            candidate_burst,
            events,
            state: Mutex::new(MockState {
                signaling: SignalingState::Stable,
                local_set: false,
                remote_set: false,
                connected_emitted: false,
                closed: 0,
                offers: 0,
                answers: 0,
                candidates_added: Vec::new(),
                tracks: LocalTracks::empty(),
                remote_sdps: Vec::new(),
            }),
        }
    }

    pub fn offers_created(&self) -> usize {
        self.state.lock().unwrap().offers
    }

    pub fn answers_created(&self) -> usize {
        self.state.lock().unwrap().answers
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn signaling_state(&self) -> SignalingState {
        self.state.lock().unwrap().signaling
    }

    pub fn candidates_added(&self) -> Vec<IceCandidate> {
        self.state.lock().unwrap().candidates_added.clone()
    }

    pub fn tracks(&self) -> LocalTracks {
        self.state.lock().unwrap().tracks.clone()
    }

    pub fn remote_sdps(&self) -> Vec<String> {
        self.state.lock().unwrap().remote_sdps.clone()
    }

    /// Simulates a callback from the underlying connection.
    pub fn emit(&self, kind: ConnectionEventKind) {
        self.events.emit(kind);
    }

    fn make_sdp(&self, kind: &str, n: usize, tracks: &LocalTracks) -> String {
        let listed: Vec<String> = tracks
            .tracks()
            .iter()
            .map(|t| {
                let kind = match t.kind {
                    TrackKind::Audio => "audio",
                    TrackKind::Video => "video",
                };
                format!("{kind}:{}", t.id)
            })
            .collect();
        let compat = if self.incompatible { ";incompatible" } else { "" };
        let mut sdp = format!(
            "mock-{kind};from={};n={n};stream={};tracks={}{compat}",
            self.label,
            tracks.stream_id(),
            listed.join(",")
        );
        for track in tracks.tracks() {
            sdp.push_str(&format!("\r\na=msid:{} {}", tracks.stream_id(), track.id));
        }
        sdp
    }

    /// Emits the events a real connection would fire after a description change.
    fn after_description(&self, gathered: Vec<IceCandidate>) {
        let connected = {
            let mut state = self.state.lock().unwrap();
            let ready = state.local_set
                && state.remote_set
                && state.signaling == SignalingState::Stable
                && !state.connected_emitted;
            if ready {
                state.connected_emitted = true;
            }
            ready
        };
        for candidate in gathered {
            self.emit(ConnectionEventKind::LocalCandidate(candidate));
        }
        if connected {
            self.emit(ConnectionEventKind::StateChanged(ConnectionState::Connected));
        }
    }
}

impl MockConnection {
    /// Candidates gathered once the first local description is set.
    fn gather(&self) -> Vec<IceCandidate> {
        (0..self.candidate_burst)
            .map(|i| {
                let foundation = if i == 0 {
                    self.label.clone()
                } else {
                    format!("{}-{i}", self.label)
                };
                IceCandidate {
                    candidate: format!(
                        "candidate:{foundation} 1 udp 2122260223 10.0.0.1 {} typ host",
                        5000 + i
                    ),
                    sdp_mid: Some("0".to_owned()),
                    sdp_m_line_index: Some(0),
                    username_fragment: None,
                }
            })
            .collect()
    }
}

fn parse_tracks(sdp: &str) -> Vec<RemoteTrack> {
    let header = sdp.lines().next().unwrap_or_default();
    let field = |name: &str| {
        header
            .split(';')
            .find_map(|part| part.strip_prefix(name))
            .unwrap_or_default()
            .to_owned()
    };
    let stream_id = field("stream=");
    field("tracks=")
        .split(',')
        .filter_map(|item| {
            let (kind, id) = item.split_once(':')?;
            let kind = match kind {
                "audio" => TrackKind::Audio,
                "video" => TrackKind::Video,
                _ => return None,
            };
            Some(RemoteTrack {
                id: id.to_owned(),
                stream_id: stream_id.clone(),
                kind,
            })
        })
        .collect()
}

#[async_trait]
impl PeerConnection for MockConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let mut state = self.state.lock().unwrap();
        if state.signaling != SignalingState::Stable {
            bail!("create_offer in {:?}", state.signaling);
        }
        state.offers += 1;
        Ok(SessionDescription::offer(self.make_sdp(
            "offer",
            state.offers,
            &state.tracks,
        )))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let mut state = self.state.lock().unwrap();
        if state.signaling != SignalingState::HaveRemoteOffer {
            bail!("create_answer in {:?}", state.signaling);
        }
        state.answers += 1;
        Ok(SessionDescription::answer(self.make_sdp(
            "answer",
            state.answers,
            &state.tracks,
        )))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        let gathered = {
            let mut state = self.state.lock().unwrap();
            state.signaling = match (state.signaling, desc.kind) {
                (SignalingState::Stable, SdpKind::Offer) => SignalingState::HaveLocalOffer,
                (SignalingState::HaveRemoteOffer, SdpKind::Answer) => SignalingState::Stable,
                (s, k) => bail!("set_local_description({k:?}) in {s:?}"),
            };
            let first = !state.local_set;
            state.local_set = true;
            if first {
                self.gather()
            } else {
                Vec::new()
            }
        };
        self.after_description(gathered);
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        if desc.sdp.contains("incompatible") {
            bail!("incompatible session description");
        }
        {
            let mut state = self.state.lock().unwrap();
            state.signaling = match (state.signaling, desc.kind) {
                (SignalingState::Stable, SdpKind::Offer) => SignalingState::HaveRemoteOffer,
                (SignalingState::HaveLocalOffer, SdpKind::Answer) => SignalingState::Stable,
                (s, k) => bail!("set_remote_description({k:?}) in {s:?}"),
            };
            state.remote_set = true;
            state.remote_sdps.push(desc.sdp.clone());
        }
        for track in parse_tracks(&desc.sdp) {
            self.emit(ConnectionEventKind::RemoteTrack(track));
        }
        self.after_description(Vec::new());
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.remote_set {
            bail!("candidate before remote description");
        }
        state.candidates_added.push(candidate);
        Ok(())
    }

    async fn set_tracks(&self, tracks: &LocalTracks) -> Result<()> {
        self.state.lock().unwrap().tracks = tracks.clone();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.lock().unwrap().closed += 1;
        Ok(())
    }
}

/// Hands out [`MockConnection`]s and keeps them for inspection.
#[derive(Clone)]
pub struct MockConnectionFactory {
    label: String,
    incompatible: bool,
    candidate_burst: usize,
    created: Arc<Mutex<Vec<Arc<MockConnection>>>>,
}

impl MockConnectionFactory {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_owned(),
            incompatible: false,
            candidate_burst: 1,
            created: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every description this factory's connections produce is rejected remotely.
    pub fn incompatible(label: &str) -> Self {
        Self {
            incompatible: true,
            ..Self::new(label)
        }
    }

    /// Every connection fires `burst` candidate callbacks from inside its first
    /// `set_local_description`.
    pub fn with_candidate_burst(label: &str, burst: usize) -> Self {
        Self {
            candidate_burst: burst,
            ..Self::new(label)
        }
    }

    pub fn created(&self) -> Vec<Arc<MockConnection>> {
        self.created.lock().unwrap().clone()
    }

    pub fn connections_to(&self, remote: &ParticipantId) -> Vec<Arc<MockConnection>> {
        self.created()
            .into_iter()
            .filter(|c| &c.remote == remote)
            .collect()
    }

    pub fn latest_to(&self, remote: &ParticipantId) -> Option<Arc<MockConnection>> {
        self.connections_to(remote).pop()
    }
}

#[async_trait]
impl ConnectionFactory for MockConnectionFactory {
    async fn create(
        &self,
        _ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn PeerConnection>> {
        let connection = Arc::new(MockConnection::new(
            self.label.clone(),
            self.incompatible,
            self.candidate_burst,
            events,
        ));
        self.created.lock().unwrap().push(Arc::clone(&connection));
        Ok(connection)
    }
}
