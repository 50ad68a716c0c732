use crate::error::AcquisitionError;
use crate::media::LocalTracks;
use async_trait::async_trait;

/// Какие источники нужны: микрофон, камера, экран.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
    pub screen: bool,
}

impl MediaConstraints {
    pub fn camera() -> Self {
        Self {
            audio: true,
            video: true,
            screen: false,
        }
    }

    pub fn screen_share() -> Self {
        Self {
            audio: true,
            video: false,
            screen: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.audio && !self.video && !self.screen
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    AudioInput,
    VideoInput,
    AudioOutput,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub device_id: String,
    pub kind: DeviceKind,
    pub label: String,
}

/// Источник локального медиа (камера, микрофон, захват экрана).
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalTracks, AcquisitionError>;

    async fn release(&self, tracks: &LocalTracks);

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, AcquisitionError>;
}

/// Участник без устройств: только пустой набор треков.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMedia;

#[async_trait]
impl MediaSource for NoMedia {
    async fn acquire(&self, constraints: MediaConstraints) -> Result<LocalTracks, AcquisitionError> {
        if constraints.is_empty() {
            return Ok(LocalTracks::empty());
        }
        Err(AcquisitionError::Unavailable(
            "no capture devices attached".to_owned(),
        ))
    }

    async fn release(&self, _tracks: &LocalTracks) {}

    async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, AcquisitionError> {
        Ok(Vec::new())
    }
}
