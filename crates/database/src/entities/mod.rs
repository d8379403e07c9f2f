//! Entity definitions for the database layer

pub mod member;
pub mod message;
pub mod room;
pub mod user;

pub use member::RoomMember;
pub use message::{NewMessage, StoredMessage};
pub use room::{NewRoom, Room, RoomVisibility};
pub use user::UserSummary;
