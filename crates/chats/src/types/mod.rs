//! Shared types for the chat services

pub mod errors;
pub mod events;
pub mod views;

pub use errors::{ChatError, ChatResult, CodecError};
pub use events::{EventSender, LiveEvent, LiveEventKind};
pub use views::{JoinOutcome, MembershipView, MessageView, RoomView, UserRef};
