use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use plaza_shared::protocol::{parse_client_msg, ClientMsg, ConnectionId, InboundError, ServerMsg};
use tokio::sync::{broadcast, mpsc, oneshot, Semaphore};

use crate::broadcast::Dispatcher;
use crate::hub::HubCommand;

/// Shared app state passed to each WebSocket handler
#[derive(Clone)]
pub struct AppState {
    pub hub_tx: mpsc::Sender<HubCommand>,
    pub dispatcher: Dispatcher,
    pub connection_semaphore: Arc<Semaphore>,
    pub max_message_bytes: usize,
}

/// HTTP handler for WebSocket upgrade
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<AppState>) -> Response {
    let permit = match app_state.connection_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Connection limit reached, rejecting upgrade");
            return (StatusCode::SERVICE_UNAVAILABLE, "server full").into_response();
        }
    };

    ws.max_message_size(app_state.max_message_bytes)
        .on_upgrade(move |socket| async move {
            handle_socket(socket, app_state).await;
            drop(permit);
        })
}

/// Sends `Leave` for its player when dropped, so the registry converges
/// however the connection task ends, including by panic.
struct SessionGuard {
    id: ConnectionId,
    hub_tx: mpsc::Sender<HubCommand>,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let cmd = HubCommand::Leave {
            id: self.id.clone(),
        };
        match self.hub_tx.try_send(cmd) {
            Ok(()) | Err(mpsc::error::TrySendError::Closed(_)) => {}
            Err(mpsc::error::TrySendError::Full(cmd)) => {
                let hub_tx = self.hub_tx.clone();
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(async move {
                        let _ = hub_tx.send(cmd).await;
                    });
                }
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    // Subscribe first so no snapshot taken after our join can be missed.
    let mut broadcast_rx = app_state.dispatcher.subscribe();

    let (resp_tx, resp_rx) = oneshot::channel();
    if app_state
        .hub_tx
        .send(HubCommand::Join { response: resp_tx })
        .await
        .is_err()
    {
        tracing::error!("Failed to send Join command");
        return;
    }

    let my_id = match resp_rx.await {
        Ok(id) => id,
        Err(_) => {
            tracing::error!("Failed to receive player id");
            return;
        }
    };
    let _session = SessionGuard {
        id: my_id.clone(),
        hub_tx: app_state.hub_tx.clone(),
    };

    tracing::info!("Player {} connected", my_id);

    let init = match serde_json::to_string(&ServerMsg::Init { id: my_id.clone() }) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!("Failed to encode init for {}: {}", my_id, e);
            return;
        }
    };
    if sink.send(Message::Text(init.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text(&app_state, &my_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Player {} transport error: {}", my_id, e);
                        break;
                    }
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client (broadcast)
            result = broadcast_rx.recv() => {
                match result {
                    Ok(frame) => {
                        if sink.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Later snapshots supersede the skipped ones.
                        tracing::warn!("Player {} lagged by {} snapshots", my_id, n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::info!("Player {} disconnected", my_id);
}

async fn handle_text(app_state: &AppState, my_id: &ConnectionId, text: &str) {
    match parse_client_msg(text) {
        Ok(ClientMsg::Update { position, .. }) => {
            let _ = app_state
                .hub_tx
                .send(HubCommand::Update {
                    id: my_id.clone(),
                    position,
                })
                .await;
        }
        Ok(ClientMsg::Unknown) => {
            tracing::debug!("Ignoring message of unknown type from {}", my_id);
        }
        Err(e @ InboundError::Malformed(_)) => {
            tracing::warn!("Invalid message received from {}: {}", my_id, e);
        }
        Err(e) => {
            tracing::debug!("Dropping update from {}: {}", my_id, e);
        }
    }
}
