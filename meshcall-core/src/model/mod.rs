mod ice;
mod participant;
mod room;
mod signaling;

pub use ice::{IceCandidate, IceServerConfig, SdpKind, SessionDescription};
pub use participant::{ParticipantId, ParticipantIdError};
pub use room::{RoomId, RoomIdError};
pub use signaling::{Frame, SignalEnvelope, SignalKind, Welcome};
