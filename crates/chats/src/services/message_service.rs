//! Posting, reading and searching room messages.

use backchannel_database::{MessageRepository, NewMessage, Page, PageRequest, StoredMessage};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::broadcast::Broadcaster;
use crate::crypto::EncryptionCodec;
use crate::search::{SearchIndex, SqliteSearchIndex};
use crate::services::RoomManager;
use crate::types::{ChatResult, EventSender, LiveEvent, LiveEventKind, MessageView, UserRef};
use crate::utils::validation;

pub const DEFAULT_MESSAGE_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostMessage {
    pub content: String,
    #[serde(default)]
    pub attachment_ref: Option<String>,
    #[serde(default)]
    pub encrypt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOrder {
    /// Full history, oldest first.
    Ascending,
    /// Newest first, one page at a time.
    Descending,
}

/// Persists messages, decrypts them on read and fans new ones out live.
#[derive(Clone)]
pub struct MessagePipeline<S = SqliteSearchIndex> {
    messages: MessageRepository,
    rooms: RoomManager,
    codec: EncryptionCodec,
    broadcaster: Broadcaster,
    search: S,
}

impl MessagePipeline<SqliteSearchIndex> {
    pub fn new(
        pool: SqlitePool,
        rooms: RoomManager,
        codec: EncryptionCodec,
        broadcaster: Broadcaster,
    ) -> Self {
        let search = SqliteSearchIndex::new(pool.clone());
        Self::with_search_index(pool, rooms, codec, broadcaster, search)
    }
}

impl<S: SearchIndex> MessagePipeline<S> {
    pub fn with_search_index(
        pool: SqlitePool,
        rooms: RoomManager,
        codec: EncryptionCodec,
        broadcaster: Broadcaster,
        search: S,
    ) -> Self {
        Self {
            messages: MessageRepository::new(pool),
            rooms,
            codec,
            broadcaster,
            search,
        }
    }

    /// Stores a message from a room member and publishes it to live
    /// subscribers.
    ///
    /// Non-members are rejected before anything is written or published.
    pub async fn post_message(
        &self,
        room_id: &str,
        sender_id: i64,
        request: PostMessage,
    ) -> ChatResult<MessageView> {
        let room = self.rooms.ensure_member(room_id, sender_id).await?;
        validation::message_content(&request.content)?;

        let content = if request.encrypt {
            self.codec.encrypt(&request.content)?
        } else {
            request.content.clone()
        };

        let stored = self
            .messages
            .insert(&NewMessage {
                room_id: room.id,
                sender_id,
                content,
                attachment_ref: request.attachment_ref,
                encrypted: request.encrypt,
            })
            .await?;

        let view = self.to_view(stored)?;

        let delivered = self.broadcaster.publish(
            &room.public_id,
            LiveEvent {
                room_id: room.public_id.clone(),
                kind: LiveEventKind::Chat,
                sender: EventSender {
                    id: view.sender.id,
                    username: view.sender.username.clone(),
                },
                message_id: Some(view.id.clone()),
                content: Some(view.content.clone()),
                attachment_ref: view.attachment_ref.clone(),
                created_at: view.created_at.clone(),
            },
        );

        info!(
            room_id = %room.public_id,
            sender_id,
            message_id = %view.id,
            encrypted = view.encrypted,
            "message posted"
        );
        debug!(room_id = %room.public_id, delivered, "chat event published");

        Ok(view)
    }

    /// Reads a room's messages for a member.
    ///
    /// `Ascending` ignores `page` and returns the whole history. `Descending`
    /// returns one page of the most recent messages.
    pub async fn list_messages(
        &self,
        room_id: &str,
        requester_id: i64,
        order: MessageOrder,
        page: Option<PageRequest>,
    ) -> ChatResult<Page<MessageView>> {
        let room = self.rooms.ensure_member(room_id, requester_id).await?;

        let page = match order {
            MessageOrder::Ascending => {
                let rows = self.messages.list_ascending(room.id).await?;
                let total = rows.len() as i64;
                let size = u32::try_from(rows.len()).unwrap_or(u32::MAX);
                Page {
                    items: rows,
                    page: 0,
                    size,
                    total,
                }
            }
            MessageOrder::Descending => {
                let request = page.unwrap_or_else(|| {
                    PageRequest::from_parts(None, None, DEFAULT_MESSAGE_PAGE_SIZE)
                });
                let rows = self
                    .messages
                    .list_recent(room.id, request.limit(), request.offset())
                    .await?;
                let total = self.messages.count_for_room(room.id).await?;
                Page::new(rows, request, total)
            }
        };

        page.try_map(|stored| self.to_view(stored))
    }

    /// Searches a room's plaintext messages, newest first.
    pub async fn search_messages(
        &self,
        room_id: &str,
        requester_id: i64,
        query: &str,
        request: PageRequest,
    ) -> ChatResult<Page<MessageView>> {
        let room = self.rooms.ensure_member(room_id, requester_id).await?;
        let terms = validation::search_terms(query)?;

        let (rows, total) = self
            .search
            .search(room.id, &terms, request.limit(), request.offset())
            .await?;

        debug!(room_id = %room.public_id, terms = terms.len(), total, "searched messages");
        Page::new(rows, request, total).try_map(|stored| self.to_view(stored))
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    fn to_view(&self, stored: StoredMessage) -> ChatResult<MessageView> {
        let content = if stored.encrypted {
            self.codec.decrypt(&stored.content)?
        } else {
            stored.content
        };

        Ok(MessageView {
            id: stored.public_id,
            room_id: stored.room_public_id,
            sender: UserRef {
                id: stored.sender_id,
                username: stored.sender_username,
            },
            content,
            attachment_ref: stored.attachment_ref,
            encrypted: stored.encrypted,
            created_at: stored.created_at,
        })
    }
}
