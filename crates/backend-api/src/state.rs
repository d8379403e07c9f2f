use backchannel_auth::{AuthenticatedUser, Authenticator};
use backchannel_chats::{Broadcaster, LiveEvent, MessagePipeline, RoomManager};
use serde::{Deserialize, Serialize};

use crate::ApiError;

#[derive(Clone)]
pub struct AppState {
    authenticator: Authenticator,
    rooms: RoomManager,
    messages: MessagePipeline,
    broadcaster: Broadcaster,
}

impl AppState {
    pub fn new(
        authenticator: Authenticator,
        rooms: RoomManager,
        messages: MessagePipeline,
        broadcaster: Broadcaster,
    ) -> Self {
        Self {
            authenticator,
            rooms,
            messages,
            broadcaster,
        }
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn messages(&self) -> &MessagePipeline {
        &self.messages
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    pub fn authenticate(&self, token: &str) -> Result<AuthenticatedUser, ApiError> {
        self.authenticator
            .authenticate(token)
            .map_err(ApiError::from)
    }
}

/// Frames a live client sends over `/ws`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Subscribe { room_id: String },
    Unsubscribe { room_id: String },
    Typing { room_id: String },
    Ping,
}

/// Frames the server sends over `/ws`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Hello { user_id: i64, username: String },
    Subscribed { room_id: String },
    Unsubscribed { room_id: String },
    Event { event: LiveEvent },
    Pong,
    Error { message: String },
}
