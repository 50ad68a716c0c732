use crate::model::{ParticipantIdError, SignalKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope has no type")]
    MissingType,

    #[error("unknown envelope type '{0}'")]
    UnknownType(String),

    #[error("envelope has no sender")]
    MissingFrom,

    #[error("{0} envelope has no recipient")]
    MissingTo(SignalKind),

    #[error(transparent)]
    InvalidParticipant(#[from] ParticipantIdError),

    #[error("welcome frame where a signal envelope was expected")]
    UnexpectedWelcome,
}
