use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// The access token is missing, malformed, expired or of the wrong kind.
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already in use")]
    EmailTaken,
    #[error("user not found")]
    UserNotFound,
    #[error("invalid refresh token")]
    InvalidToken,
    #[error("refresh token has been revoked")]
    TokenRevoked,
    #[error("refresh token has expired")]
    TokenExpired,
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("token lifetime is out of range")]
    TokenLifetime,
    #[error("token encoding failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
}

