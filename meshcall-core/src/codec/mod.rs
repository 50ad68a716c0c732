mod decode_error;

pub use decode_error::DecodeError;

use crate::model::{Frame, ParticipantId, SignalEnvelope, SignalKind, Welcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const WELCOME: &str = "welcome";

#[derive(Serialize)]
struct WireOut<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<&'a ParticipantId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<&'a ParticipantId>,
    payload: &'a Value,
}

#[derive(Deserialize)]
struct WireIn {
    #[serde(rename = "type")]
    kind: Option<String>,
    from: Option<String>,
    to: Option<String>,
    #[serde(default)]
    payload: Value,
}

pub fn encode(envelope: &SignalEnvelope) -> serde_json::Result<String> {
    serde_json::to_string(&WireOut {
        kind: envelope.kind.as_str(),
        from: Some(&envelope.from),
        to: envelope.to.as_ref(),
        payload: &envelope.payload,
    })
}

pub fn encode_frame(frame: &Frame) -> serde_json::Result<String> {
    match frame {
        Frame::Signal(envelope) => encode(envelope),
        Frame::Welcome(welcome) => {
            let payload = serde_json::to_value(welcome)?;
            serde_json::to_string(&WireOut {
                kind: WELCOME,
                from: None,
                to: None,
                payload: &payload,
            })
        }
    }
}

/// Разбирает конверт и проверяет поля маршрутизации.
pub fn decode(text: &str) -> Result<SignalEnvelope, DecodeError> {
    let wire: WireIn = serde_json::from_str(text)?;
    let kind = wire.kind.as_deref().ok_or(DecodeError::MissingType)?;
    if kind == WELCOME {
        return Err(DecodeError::UnexpectedWelcome);
    }
    envelope_from_wire(kind, &wire)
}

pub fn decode_frame(text: &str) -> Result<Frame, DecodeError> {
    let wire: WireIn = serde_json::from_str(text)?;
    let kind = wire.kind.as_deref().ok_or(DecodeError::MissingType)?;
    if kind == WELCOME {
        let welcome: Welcome = serde_json::from_value(wire.payload)?;
        return Ok(Frame::Welcome(welcome));
    }
    envelope_from_wire(kind, &wire).map(Frame::Signal)
}

fn envelope_from_wire(kind: &str, wire: &WireIn) -> Result<SignalEnvelope, DecodeError> {
    let kind = SignalKind::parse(kind).ok_or_else(|| DecodeError::UnknownType(kind.to_owned()))?;

    let from = match wire.from.as_deref() {
        None | Some("") => return Err(DecodeError::MissingFrom),
        Some(raw) => raw.parse::<ParticipantId>()?,
    };

    let to = if kind.is_broadcast() {
        None
    } else {
        match wire.to.as_deref() {
            None | Some("") => return Err(DecodeError::MissingTo(kind)),
            Some(raw) => Some(raw.parse::<ParticipantId>()?),
        }
    };

    Ok(SignalEnvelope {
        kind,
        from,
        to,
        payload: wire.payload.clone(),
    })
}
