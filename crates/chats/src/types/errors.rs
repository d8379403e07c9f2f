//! Error types for rooms, messages and encryption.

use backchannel_database::DatabaseError;
use thiserror::Error;

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("room not found: {id}")]
    RoomNotFound { id: String },

    #[error("user not found: {id}")]
    UserNotFound { id: i64 },

    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("user {user_id} is already a member of this room")]
    AlreadyMember { user_id: i64 },

    #[error("user {user_id} is not a member of this room")]
    NotMember { user_id: i64 },

    #[error("the last admin of a room cannot leave it")]
    LastAdmin,

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
}

impl ChatError {
    pub fn room_not_found(id: impl Into<String>) -> Self {
        Self::RoomNotFound { id: id.into() }
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("encryption key must be 32 bytes of base64")]
    InvalidKey,

    #[error("ciphertext is malformed")]
    MalformedBlob,

    /// The integrity tag did not match, so the blob was altered or was
    /// sealed under a different key.
    #[error("ciphertext failed authentication")]
    AuthenticationFailure,

    #[error("encryption failed")]
    Encryption,
}
