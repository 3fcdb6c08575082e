use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State as AxumState,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use slurk_types::{
    api::{Update, UpdatesFilter},
    GameId,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{timeout, Duration};

use super::ApiError;
use crate::Server;

const SEND_TIMEOUT: Duration = Duration::from_secs(2);
const OUTBOUND_CAPACITY: usize = 256;

pub(super) async fn game_updates(
    AxumState(server): AxumState<Arc<Server>>,
    Path(id): Path<GameId>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(server, UpdatesFilter::Id(id), ws).await
}

pub(super) async fn code_updates(
    AxumState(server): AxumState<Arc<Server>>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(server, UpdatesFilter::Code(code), ws).await
}

async fn upgrade(server: Arc<Server>, filter: UpdatesFilter, ws: WebSocketUpgrade) -> Response {
    let game_id = match server.resolve(&filter).await {
        Ok(game_id) => game_id,
        Err(err) => return ApiError(err).into_response(),
    };
    // Subscribe before the upgrade so nothing published in between is missed.
    let updates = server.subscribe();
    ws.on_upgrade(move |socket| handle_updates(socket, game_id, updates))
        .into_response()
}

async fn handle_updates(
    socket: WebSocket,
    game_id: GameId,
    mut updates: broadcast::Receiver<Update>,
) {
    tracing::info!(%game_id, "updates websocket connected");
    let (mut sender, mut receiver) = socket.split();

    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            match timeout(SEND_TIMEOUT, sender.send(msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    tracing::warn!(%game_id, "failed to send update, client disconnected");
                    break;
                }
                Err(_) => {
                    tracing::warn!(%game_id, "websocket send timed out, closing connection");
                    break;
                }
            }
        }
        let _ = sender.close().await;
    });

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(%game_id, "client closed websocket");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if out_tx.try_send(Message::Pong(data)).is_err() {
                            tracing::warn!(%game_id, "failed to enqueue pong, closing connection");
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        tracing::warn!(%game_id, ?err, "websocket error");
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }
            update = updates.recv() => {
                match update {
                    Ok(update) => {
                        if update.game_id() != game_id {
                            continue;
                        }
                        let deleted = matches!(update, Update::Deleted { .. });
                        let text = match serde_json::to_string(&update) {
                            Ok(text) => text,
                            Err(err) => {
                                tracing::error!(%game_id, ?err, "failed to encode update");
                                continue;
                            }
                        };
                        if out_tx.try_send(Message::Text(text)).is_err() {
                            tracing::warn!(%game_id, "outbound queue full, closing connection");
                            break;
                        }
                        if deleted {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(%game_id, skipped, "websocket subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("update channel closed");
                        break;
                    }
                }
            }
        }
    }
    tracing::info!(%game_id, "updates websocket exiting");
    drop(out_tx);
    let _ = writer_handle.await;
}
