use crate::model::ice::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
use crate::model::participant::ParticipantId;
use crate::model::room::RoomId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    Join,
    Offer,
    Answer,
    Candidate,
    Leave,
}

impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::Candidate => "candidate",
            Self::Leave => "leave",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "join" => Some(Self::Join),
            "offer" => Some(Self::Offer),
            "answer" => Some(Self::Answer),
            "candidate" => Some(Self::Candidate),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }

    /// `join` и `leave` рассылаются всей комнате, остальное адресное.
    pub fn is_broadcast(&self) -> bool {
        matches!(self, Self::Join | Self::Leave)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Конверт сигнального протокола. `payload` не интерпретируется кодеком.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEnvelope {
    pub kind: SignalKind,
    pub from: ParticipantId,
    pub to: Option<ParticipantId>,
    pub payload: Value,
}

impl SignalEnvelope {
    pub fn join(from: ParticipantId, version: u64) -> Self {
        Self {
            kind: SignalKind::Join,
            from,
            to: None,
            payload: json!({ "version": version }),
        }
    }

    pub fn leave(from: ParticipantId, version: u64) -> Self {
        Self {
            kind: SignalKind::Leave,
            from,
            to: None,
            payload: json!({ "version": version }),
        }
    }

    pub fn description(from: ParticipantId, to: ParticipantId, desc: &SessionDescription) -> Self {
        let kind = match desc.kind {
            SdpKind::Offer => SignalKind::Offer,
            SdpKind::Answer => SignalKind::Answer,
        };
        Self {
            kind,
            from,
            to: Some(to),
            payload: serde_json::to_value(desc).unwrap_or(Value::Null),
        }
    }

    pub fn candidate(from: ParticipantId, to: ParticipantId, candidate: &IceCandidate) -> Self {
        Self {
            kind: SignalKind::Candidate,
            from,
            to: Some(to),
            payload: serde_json::to_value(candidate).unwrap_or(Value::Null),
        }
    }

    /// Версия членства из `join`/`leave`, если relay её приложил.
    pub fn membership_version(&self) -> Option<u64> {
        self.payload.get("version").and_then(Value::as_u64)
    }
}

/// Снимок комнаты, который relay отправляет новому участнику первым кадром.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Welcome {
    pub participant: ParticipantId,
    pub room: RoomId,
    pub members: Vec<ParticipantId>,
    pub version: u64,
    #[serde(default)]
    pub ice_servers: Vec<IceServerConfig>,
}

/// Всё, что relay может прислать клиенту.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Welcome(Welcome),
    Signal(SignalEnvelope),
}
