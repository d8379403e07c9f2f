//! Repository implementations for database access

pub mod member_repository;
pub mod message_repository;
pub mod room_repository;
pub mod user_repository;

pub use member_repository::MemberRepository;
pub use message_repository::MessageRepository;
pub use room_repository::RoomRepository;
pub use user_repository::UserRepository;
