//! Backchannel Chats Crate
//!
//! Rooms and memberships, the message pipeline with optional encryption at
//! rest, and the per-room live broadcaster.

pub mod broadcast;
pub mod crypto;
pub mod search;
pub mod services;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use broadcast::{Broadcaster, Subscription, DEFAULT_CHANNEL_CAPACITY};
pub use crypto::EncryptionCodec;
pub use search::{SearchIndex, SqliteSearchIndex};
pub use services::{
    MembershipStore, MessageOrder, MessagePipeline, PostMessage, RoomManager,
    DEFAULT_MESSAGE_PAGE_SIZE, DEFAULT_ROOM_PAGE_SIZE,
};
pub use types::{
    ChatError, ChatResult, CodecError, EventSender, JoinOutcome, LiveEvent, LiveEventKind,
    MembershipView, MessageView, RoomView, UserRef,
};
