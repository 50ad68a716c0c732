use crate::connection::{
    ConnectionEventKind, ConnectionEvents, ConnectionFactory, ConnectionState, PeerConnection,
    RemoteTrack,
};
use crate::media::{LocalTrack, LocalTracks, TrackKind};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use bytes::Bytes;
use meshcall_core::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::{MIME_TYPE_OPUS, MIME_TYPE_VP8, MediaEngine};
use webrtc::api::setting_engine::SettingEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::media::Sample;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::{RTCRtpCodecCapability, RTPCodecType};
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::rtp_sender::RTCRtpSender;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::{RTCRtpTransceiver, RTCRtpTransceiverInit};
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

struct SentTrack {
    sender: Arc<RTCRtpSender>,
    track: Arc<TrackLocalStaticSample>,
    enabled: bool,
}

/// Соединение поверх `webrtc::RTCPeerConnection`.
pub struct RtcConnection {
    peer_connection: Arc<RTCPeerConnection>,
    sent: Mutex<HashMap<String, SentTrack>>,
}

impl RtcConnection {
    pub async fn new(ice_servers: &[IceServerConfig], events: ConnectionEvents) -> Result<Self> {
        Self::with_setting_engine(ice_servers, events, SettingEngine::default()).await
    }

    pub async fn with_setting_engine(
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
        setting_engine: SettingEngine,
    ) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .with_setting_engine(setting_engine)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers.iter().map(to_rtc_ice_server).collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        let state_events = events.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let events = state_events.clone();
                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", events.remote(), s);
                    if let Some(state) = map_state(s) {
                        events.emit(ConnectionEventKind::StateChanged(state));
                    }
                })
            },
        ));

        let ice_events = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let events = ice_events.clone();
            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                events.emit(ConnectionEventKind::LocalCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        let track_events = events;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let events = track_events.clone();
                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => TrackKind::Audio,
                        RTPCodecType::Video => TrackKind::Video,
                        _ => return,
                    };
                    debug!("Remote track {} from {}", track.id(), events.remote());
                    events.emit(ConnectionEventKind::RemoteTrack(RemoteTrack {
                        id: track.id(),
                        stream_id: track.stream_id(),
                        kind,
                    }));
                })
            },
        ));

        Ok(Self {
            peer_connection,
            sent: Mutex::new(HashMap::new()),
        })
    }

    /// Отправить кадр трека. Выключенный трек кадры молча пропускает.
    pub async fn write_sample(&self, track_id: &str, data: Bytes, duration: Duration) -> Result<()> {
        let sent = self.sent.lock().await;
        let Some(track) = sent.get(track_id) else {
            bail!("Unknown track {}", track_id);
        };
        if !track.enabled {
            return Ok(());
        }
        track
            .track
            .write_sample(&Sample {
                data,
                duration,
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to write sample to {}", track_id))?;
        Ok(())
    }

    /// Вид, который сами не отправляем, всё равно принимаем: без этого
    /// offer участника без медиа не содержит ни одной m-строки.
    async fn ensure_receivers(&self) -> Result<()> {
        let transceivers = self.peer_connection.get_transceivers().await;
        for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
            if transceivers.iter().any(|t| t.kind() == kind) {
                continue;
            }
            debug!("Adding {} receiver", kind);
            self.peer_connection
                .add_transceiver_from_kind(
                    kind,
                    Some(RTCRtpTransceiverInit {
                        direction: RTCRtpTransceiverDirection::Recvonly,
                        send_encodings: Vec::new(),
                    }),
                )
                .await
                .with_context(|| format!("Failed to add {} receiver", kind))?;
        }
        Ok(())
    }

    async fn add_track(&self, stream_id: &str, local: &LocalTrack) -> Result<SentTrack> {
        let mime_type = match local.kind {
            TrackKind::Audio => MIME_TYPE_OPUS,
            TrackKind::Video => MIME_TYPE_VP8,
        };
        let track = Arc::new(TrackLocalStaticSample::new(
            RTCRtpCodecCapability {
                mime_type: mime_type.to_owned(),
                ..Default::default()
            },
            local.id.clone(),
            stream_id.to_owned(),
        ));
        let sender = self
            .peer_connection
            .add_track(Arc::clone(&track) as Arc<dyn TrackLocal + Send + Sync>)
            .await
            .with_context(|| format!("Failed to add track {}", local.id))?;

        if !local.enabled {
            sender.replace_track(None).await?;
        }
        Ok(SentTrack {
            sender,
            track,
            enabled: local.enabled,
        })
    }
}

#[async_trait]
impl PeerConnection for RtcConnection {
    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_local_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        self.peer_connection
            .set_remote_description(to_rtc_description(desc)?)
            .await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn set_tracks(&self, tracks: &LocalTracks) -> Result<()> {
        let mut sent = self.sent.lock().await;

        let stale: Vec<String> = sent
            .keys()
            .filter(|id| tracks.get(id).is_none())
            .cloned()
            .collect();
        for id in stale {
            if let Some(track) = sent.remove(&id) {
                self.peer_connection.remove_track(&track.sender).await?;
            }
        }

        for local in tracks.tracks() {
            match sent.get_mut(&local.id) {
                None => {
                    let track = self.add_track(tracks.stream_id(), local).await?;
                    sent.insert(local.id.clone(), track);
                }
                Some(track) if track.enabled != local.enabled => {
                    let replacement = local
                        .enabled
                        .then(|| Arc::clone(&track.track) as Arc<dyn TrackLocal + Send + Sync>);
                    track.sender.replace_track(replacement).await?;
                    track.enabled = local.enabled;
                }
                Some(_) => {}
            }
        }
        self.ensure_receivers().await
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RtcConnectionFactory {
    loopback_candidates: bool,
}

impl RtcConnectionFactory {
    /// Собирать и loopback-кандидаты, для звонков в пределах одной машины.
    pub fn with_loopback_candidates() -> Self {
        Self {
            loopback_candidates: true,
        }
    }
}

#[async_trait]
impl ConnectionFactory for RtcConnectionFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn PeerConnection>> {
        let mut setting_engine = SettingEngine::default();
        setting_engine.set_include_loopback_candidate(self.loopback_candidates);
        Ok(Arc::new(
            RtcConnection::with_setting_engine(ice_servers, events, setting_engine).await?,
        ))
    }
}

fn to_rtc_ice_server(server: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: server.urls.clone(),
        username: server.username.clone().unwrap_or_default(),
        credential: server.credential.clone().unwrap_or_default(),
    }
}

fn to_rtc_description(desc: SessionDescription) -> Result<RTCSessionDescription> {
    let rtc = match desc.kind {
        SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
        SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
    };
    Ok(rtc)
}

fn map_state(state: RTCPeerConnectionState) -> Option<ConnectionState> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionState::New),
        RTCPeerConnectionState::Connecting => Some(ConnectionState::Connecting),
        RTCPeerConnectionState::Connected => Some(ConnectionState::Connected),
        RTCPeerConnectionState::Disconnected => Some(ConnectionState::Disconnected),
        RTCPeerConnectionState::Failed => Some(ConnectionState::Failed),
        RTCPeerConnectionState::Closed => Some(ConnectionState::Closed),
        _ => None,
    }
}
