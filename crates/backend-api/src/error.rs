use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use backchannel_auth::AuthError;
use backchannel_chats::ChatError;
use serde::Serialize;
use tracing::{debug, error};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::internal_server_error("internal server error")
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match &error {
            AuthError::Unauthenticated
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenRevoked
            | AuthError::TokenExpired
            | AuthError::TokenNotFound => StatusCode::UNAUTHORIZED,
            AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::TokenLifetime
            | AuthError::Jwt(_)
            | AuthError::Database(_)
            | AuthError::PasswordHash(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_logging(status, error.to_string(), "auth error")
    }
}

impl From<ChatError> for ApiError {
    fn from(error: ChatError) -> Self {
        let status = match &error {
            ChatError::RoomNotFound { .. }
            | ChatError::UserNotFound { .. }
            | ChatError::NotMember { .. } => StatusCode::NOT_FOUND,
            ChatError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ChatError::AlreadyMember { .. } => StatusCode::CONFLICT,
            ChatError::Validation { .. } | ChatError::LastAdmin => StatusCode::BAD_REQUEST,
            ChatError::Codec(_) | ChatError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::with_logging(status, error.to_string(), "chat error")
    }
}

impl ApiError {
    /// Server faults are logged and hidden from the client; client faults
    /// keep their message.
    fn with_logging(status: StatusCode, message: String, kind: &'static str) -> Self {
        if status.is_server_error() {
            error!(%status, error = %message, "{}", kind);
            Self::new(status, "internal server error")
        } else {
            debug!(%status, error = %message, "{}", kind);
            Self::new(status, message)
        }
    }
}
