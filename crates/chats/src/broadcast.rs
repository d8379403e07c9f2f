//! Per-room live event fan-out.
//!
//! Every room with at least one subscriber owns a `tokio::sync::broadcast`
//! channel. Publishing never waits on receivers, and a receiver that falls
//! behind skips the events it missed.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::LiveEvent;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct Broadcaster {
    rooms: Arc<DashMap<String, broadcast::Sender<LiveEvent>>>,
    capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            rooms: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Subscribes to a room. Only events published after this call are seen.
    ///
    /// Callers are expected to have checked membership already.
    pub fn subscribe(&self, room_id: &str) -> Subscription {
        let receiver = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe();

        let subscription = Subscription {
            id: Uuid::new_v4(),
            room_id: room_id.to_string(),
            receiver,
        };
        debug!(room_id, subscription = %subscription.id, "subscribed to room");
        subscription
    }

    /// Drops the subscription and forgets the room once nobody listens.
    pub fn unsubscribe(&self, subscription: Subscription) {
        let Subscription { id, room_id, receiver } = subscription;
        drop(receiver);

        self.rooms
            .remove_if(&room_id, |_, sender| sender.receiver_count() == 0);
        debug!(room_id = %room_id, subscription = %id, "unsubscribed from room");
    }

    /// Delivers the event to the room's current subscribers and returns how
    /// many there were.
    pub fn publish(&self, room_id: &str, event: LiveEvent) -> usize {
        let Some(sender) = self.rooms.get(room_id) else {
            return 0;
        };
        match sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!(room_id, "no live receivers for event");
                0
            }
        }
    }

    pub fn subscriber_count(&self, room_id: &str) -> usize {
        self.rooms
            .get(room_id)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

/// One listener on one room.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    room_id: String,
    receiver: broadcast::Receiver<LiveEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// Waits for the next event. Returns `None` once the room's channel is
    /// gone. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<LiveEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        room_id = %self.room_id,
                        subscription = %self.id,
                        skipped,
                        "subscriber lagged behind, dropping events"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
