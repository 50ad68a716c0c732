use crate::connection::ConnectionEvents;
use crate::media::LocalTracks;
use anyhow::Result;
use async_trait::async_trait;
use meshcall_core::{IceCandidate, IceServerConfig, SessionDescription};
use std::sync::Arc;

/// Примитив прямого соединения с одним удалённым участником.
///
/// Колбэки (`onicecandidate`, `ontrack`, смена состояния) приходят
/// через [`ConnectionEvents`], переданный фабрике.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription>;

    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_local_description(&self, desc: SessionDescription) -> Result<()>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    /// Привести отправляемые треки к `tracks`: добавить новые, убрать
    /// отсутствующие, выключенные отправлять пустыми. Аудио и видео
    /// принимаются и тогда, когда сами не отправляются.
    async fn set_tracks(&self, tracks: &LocalTracks) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: ConnectionEvents,
    ) -> Result<Arc<dyn PeerConnection>>;
}
