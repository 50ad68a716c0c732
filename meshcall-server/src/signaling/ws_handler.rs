use crate::room::RoomCommand;
use crate::signaling::SignalingService;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use meshcall_core::{Frame, ParticipantId, RoomId, SignalKind, decode, encode_frame};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_id): Path<String>,
    State(service): State<SignalingService>,
) -> Response {
    let room_id = match RoomId::parse(&room_id) {
        Ok(id) => id,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, room_id, service))
}

async fn handle_socket(socket: WebSocket, room_id: RoomId, service: SignalingService) {
    // Идентификатор выдаёт relay, клиентскому `from` не доверяем.
    let participant_id = ParticipantId::new();
    info!(
        "New WebSocket connection: {} in room {}",
        participant_id, room_id
    );

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Frame>();

    let room_tx = service.registry.attach(&room_id);
    let connect = RoomCommand::Connect {
        participant_id: participant_id.clone(),
        outbox: tx,
    };
    if let Err(e) = room_tx.send(connect).await {
        error!("Room {} died: {}", room_id, e);
        service.registry.detach(&room_id);
        return;
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match encode_frame(&frame) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let room_tx = room_tx.clone();
        let participant_id = participant_id.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => match decode(text.as_str()) {
                        Ok(envelope) => match envelope.kind {
                            SignalKind::Leave => {
                                info!("Participant {} left explicitly", participant_id);
                                break;
                            }
                            SignalKind::Join => {
                                debug!("Ignoring client-sent join from {}", participant_id);
                            }
                            _ => {
                                if envelope.from != participant_id {
                                    warn!(
                                        "Participant {} claims to be {}, overriding sender",
                                        participant_id, envelope.from
                                    );
                                }
                                let cmd = RoomCommand::Signal {
                                    from: participant_id.clone(),
                                    envelope,
                                };
                                if let Err(e) = room_tx.send(cmd).await {
                                    error!("Room died: {}", e);
                                    break;
                                }
                            }
                        },
                        Err(e) => warn!("Invalid envelope from {}: {}", participant_id, e),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    let _ = room_tx
        .send(RoomCommand::Disconnect {
            participant_id: participant_id.clone(),
        })
        .await;
    service.registry.detach(&room_id);

    info!("WebSocket disconnected: {}", participant_id);
}
