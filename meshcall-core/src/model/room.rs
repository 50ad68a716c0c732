use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

const MAX_ROOM_ID_LEN: usize = 64;
const SEGMENT_LEN: usize = 4;
const SEGMENTS: usize = 3;

/// Имя встречи. Используется в URL, поэтому алфавит ограничен `[a-z0-9_-]`.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

#[derive(Debug, Error, PartialEq)]
pub enum RoomIdError {
    #[error("room id is empty")]
    Empty,
    #[error("room id is longer than 64 characters")]
    TooLong,
    #[error("room id contains forbidden character {0:?}")]
    ForbiddenChar(char),
}

impl RoomId {
    pub fn parse(s: &str) -> Result<Self, RoomIdError> {
        if s.is_empty() {
            return Err(RoomIdError::Empty);
        }
        if s.len() > MAX_ROOM_ID_LEN {
            return Err(RoomIdError::TooLong);
        }
        if let Some(c) = s
            .chars()
            .find(|c| !matches!(c, 'a'..='z' | '0'..='9' | '-' | '_'))
        {
            return Err(RoomIdError::ForbiddenChar(c));
        }
        Ok(Self(s.to_owned()))
    }

    /// Случайное имя вида `abcd-efgh-ijkl`.
    pub fn generate() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let mut id = String::with_capacity(SEGMENTS * (SEGMENT_LEN + 1));
        for (i, b) in bytes.iter().take(SEGMENTS * SEGMENT_LEN).enumerate() {
            if i > 0 && i % SEGMENT_LEN == 0 {
                id.push('-');
            }
            id.push(char::from(b'a' + b % 26));
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
