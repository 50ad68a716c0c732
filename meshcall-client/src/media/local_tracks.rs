use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackSource {
    Microphone,
    Camera,
    Screen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTrack {
    pub id: String,
    pub kind: TrackKind,
    pub source: TrackSource,
    pub enabled: bool,
}

impl LocalTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind, source: TrackSource) -> Self {
        Self {
            id: id.into(),
            kind,
            source,
            enabled: true,
        }
    }
}

/// Локальный вклад участника в сетку: один поток и его треки.
///
/// Разделяется между всеми сессиями через `Arc` и меняется только
/// координатором целиком.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalTracks {
    stream_id: String,
    tracks: Vec<LocalTrack>,
}

impl LocalTracks {
    pub fn new(stream_id: impl Into<String>, tracks: Vec<LocalTrack>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn tracks(&self) -> &[LocalTrack] {
        &self.tracks
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, track_id: &str) -> Option<&LocalTrack> {
        self.tracks.iter().find(|t| t.id == track_id)
    }

    /// Совпадает ли набор идентификаторов треков. Флаги `enabled` не учитываются.
    pub fn same_tracks(&self, other: &LocalTracks) -> bool {
        let ids = |t: &LocalTracks| t.tracks.iter().map(|t| t.id.clone()).collect::<BTreeSet<_>>();
        self.stream_id == other.stream_id && ids(self) == ids(other)
    }

    pub fn with_enabled(&self, track_id: &str, enabled: bool) -> Option<LocalTracks> {
        self.get(track_id)?;
        let mut next = self.clone();
        for track in next.tracks.iter_mut().filter(|t| t.id == track_id) {
            track.enabled = enabled;
        }
        Some(next)
    }
}
