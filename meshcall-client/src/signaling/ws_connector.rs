use crate::error::MeshError;
use crate::signaling::{SignalingConnector, SignalingLink};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use meshcall_core::{Frame, RoomId, SignalEnvelope, decode_frame, encode};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Сигнальный канал поверх WebSocket relay: `{base_url}/ws/{room}`.
#[derive(Debug, Clone)]
pub struct WsConnector {
    base_url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn room_url(&self, room_id: &RoomId) -> String {
        format!("{}/ws/{}", self.base_url.trim_end_matches('/'), room_id)
    }
}

#[async_trait]
impl SignalingConnector for WsConnector {
    async fn connect(&self, room_id: &RoomId) -> Result<SignalingLink, MeshError> {
        let url = self.room_url(room_id);
        let (ws_stream, _) = timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| MeshError::Transport(format!("connect to {url} timed out")))?
            .map_err(|e| MeshError::Transport(format!("websocket connect failed: {e}")))?;
        debug!("Signaling websocket connected to {}", url);

        let (mut ws_write, mut ws_read) = ws_stream.split();

        // Первый кадр от relay всегда welcome.
        let welcome = loop {
            let next = timeout(self.connect_timeout, ws_read.next())
                .await
                .map_err(|_| MeshError::Transport("no welcome from relay".to_owned()))?;
            match next {
                Some(Ok(Message::Text(text))) => match decode_frame(text.as_str())? {
                    Frame::Welcome(welcome) => break welcome,
                    Frame::Signal(envelope) => {
                        return Err(MeshError::Transport(format!(
                            "expected welcome, got {}",
                            envelope.kind
                        )));
                    }
                },
                Some(Ok(Message::Close(_))) | None => {
                    return Err(MeshError::Transport(
                        "relay closed before welcome".to_owned(),
                    ));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(MeshError::Transport(e.to_string())),
            }
        };
        info!(
            "Joined room {} as {} ({} members present)",
            welcome.room,
            welcome.participant,
            welcome.members.len()
        );

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<SignalEnvelope>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<SignalEnvelope>();

        tokio::spawn(async move {
            while let Some(envelope) = outbound_rx.recv().await {
                let text = match encode(&envelope) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode {} envelope: {}", envelope.kind, e);
                        continue;
                    }
                };
                if ws_write.send(Message::Text(text.into())).await.is_err() {
                    return;
                }
            }
            let _ = ws_write.send(Message::Close(None)).await;
        });

        tokio::spawn(async move {
            while let Some(msg) = ws_read.next().await {
                match msg {
                    Ok(Message::Text(text)) => match decode_frame(text.as_str()) {
                        Ok(Frame::Signal(envelope)) => {
                            if inbound_tx.send(envelope).is_err() {
                                break;
                            }
                        }
                        Ok(Frame::Welcome(_)) => warn!("Unexpected second welcome ignored"),
                        Err(e) => warn!("Dropping undecodable frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Signaling websocket error: {}", e);
                        break;
                    }
                }
            }
        });

        Ok(SignalingLink {
            welcome,
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}
