use std::collections::HashMap;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use backchannel_auth::AuthenticatedUser;
use backchannel_chats::{ChatError, EventSender, LiveEvent, LiveEventKind, Subscription};
use backchannel_database::util::now_timestamp;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::{AppState, ClientEvent, ServerEvent};
use crate::ApiError;

const OUTBOUND_BUFFER: usize = 100;

#[derive(Debug, Deserialize)]
pub struct WebSocketQuery {
    token: Option<String>,
}

/// Upgrades to a live connection. The access token travels in the query
/// string and is checked before the upgrade.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WebSocketQuery>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    let token = params
        .token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing access token"))?;
    let user = state.authenticate(&token)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

/// A forwarding task from one room to this connection.
struct RoomForwarder {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl RoomForwarder {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        if self.task.await.is_err() {
            debug!("room forwarder ended abnormally");
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, user: AuthenticatedUser) {
    let (mut ws_sender, mut receiver) = socket.split();
    let mut forwarders: HashMap<String, RoomForwarder> = HashMap::new();

    let (out_tx, mut out_rx) = mpsc::channel::<ServerEvent>(OUTBOUND_BUFFER);
    let sender_task = tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(error) => {
                    warn!(%error, "failed to encode server event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    info!(user_id = user.user_id, "live connection opened");
    let hello = ServerEvent::Hello {
        user_id: user.user_id,
        username: user.username.clone(),
    };
    if out_tx.send(hello).await.is_err() {
        sender_task.abort();
        debug!(user_id = user.user_id, "live connection closed before hello");
        return;
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(event) => {
                        handle_client_event(event, &state, &user, &out_tx, &mut forwarders).await
                    }
                    Err(error) => {
                        debug!(user_id = user.user_id, %error, "unparseable client event");
                        Some(ServerEvent::Error {
                            message: "invalid event format".to_string(),
                        })
                    }
                };
                if let Some(reply) = reply {
                    if out_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(error) => {
                debug!(user_id = user.user_id, %error, "live connection failed");
                break;
            }
        }
    }

    for (_, forwarder) in forwarders.drain() {
        forwarder.shutdown().await;
    }
    drop(out_tx);
    sender_task.abort();

    info!(user_id = user.user_id, "live connection closed");
}

async fn handle_client_event(
    event: ClientEvent,
    state: &AppState,
    user: &AuthenticatedUser,
    out_tx: &mpsc::Sender<ServerEvent>,
    forwarders: &mut HashMap<String, RoomForwarder>,
) -> Option<ServerEvent> {
    match event {
        ClientEvent::Subscribe { room_id } => {
            match forwarders.remove(&room_id) {
                Some(forwarder) if !forwarder.task.is_finished() => {
                    forwarders.insert(room_id.clone(), forwarder);
                    return Some(ServerEvent::Subscribed { room_id });
                }
                // Ended after the member left the room.
                Some(forwarder) => forwarder.shutdown().await,
                None => {}
            }

            // Subscribe before checking so that a concurrent removal is
            // seen as a leave event by the forwarder.
            let subscription = state.broadcaster().subscribe(&room_id);
            if let Err(error) = state.rooms().ensure_member(&room_id, user.user_id).await {
                state.broadcaster().unsubscribe(subscription);
                return Some(error_event(error));
            }

            let forwarder = spawn_forwarder(state, subscription, user.user_id, out_tx.clone());
            forwarders.insert(room_id.clone(), forwarder);
            debug!(user_id = user.user_id, room_id = %room_id, "live subscription added");
            Some(ServerEvent::Subscribed { room_id })
        }
        ClientEvent::Unsubscribe { room_id } => {
            if let Some(forwarder) = forwarders.remove(&room_id) {
                forwarder.shutdown().await;
            }
            Some(ServerEvent::Unsubscribed { room_id })
        }
        ClientEvent::Typing { room_id } => {
            if let Err(error) = state.rooms().ensure_member(&room_id, user.user_id).await {
                return Some(error_event(error));
            }
            let event = LiveEvent::presence(
                room_id.clone(),
                LiveEventKind::Typing,
                EventSender {
                    id: user.user_id,
                    username: user.username.clone(),
                },
                now_timestamp(),
            );
            state.broadcaster().publish(&room_id, event);
            None
        }
        ClientEvent::Ping => Some(ServerEvent::Pong),
    }
}

/// Forwards one room's events until stopped, or until the connection's own
/// user leaves the room.
fn spawn_forwarder(
    state: &AppState,
    mut subscription: Subscription,
    user_id: i64,
    out_tx: mpsc::Sender<ServerEvent>,
) -> RoomForwarder {
    let broadcaster = state.broadcaster().clone();
    let (stop, mut stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut stopped => break,
                event = subscription.recv() => {
                    let Some(event) = event else { break };
                    let removed = event.kind == LiveEventKind::Leave && event.sender.id == user_id;
                    if out_tx.send(ServerEvent::Event { event }).await.is_err() {
                        break;
                    }
                    if removed {
                        debug!(user_id, room_id = %subscription.room_id(), "member left, ending live subscription");
                        let room_id = subscription.room_id().to_string();
                        if out_tx.send(ServerEvent::Unsubscribed { room_id }).await.is_err() {
                            debug!(user_id, "live connection gone before unsubscribe notice");
                        }
                        break;
                    }
                }
            }
        }
        broadcaster.unsubscribe(subscription);
    });

    RoomForwarder { stop, task }
}

fn error_event(error: ChatError) -> ServerEvent {
    let message = match &error {
        ChatError::Database(_) | ChatError::Codec(_) => {
            warn!(%error, "live request failed");
            "internal error".to_string()
        }
        _ => error.to_string(),
    };
    ServerEvent::Error { message }
}
