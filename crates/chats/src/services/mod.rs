mod membership;
mod message_service;
mod room_service;

pub use membership::MembershipStore;
pub use message_service::{MessageOrder, MessagePipeline, PostMessage, DEFAULT_MESSAGE_PAGE_SIZE};
pub use room_service::{RoomManager, DEFAULT_ROOM_PAGE_SIZE};
