use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use backchannel_auth::{AuthSession, Identity, RegisterRequest, TokenPair};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{util::require_user, ApiError, AppState};

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SigninRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl From<TokenPair> for TokenResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer",
            access_expires_at: pair.access_expires_at,
            refresh_expires_at: pair.refresh_expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Identity,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: Identity,
    pub tokens: TokenResponse,
}

impl From<AuthSession> for SessionResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user,
            tokens: session.tokens.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub revoked: u64,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state
        .authenticator()
        .register(&RegisterRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse { user })))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(payload): Json<SigninRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state
        .authenticator()
        .login(&payload.username, &payload.password)
        .await?;

    Ok(Json(session.into()))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let tokens = state.authenticator().refresh(&payload.refresh_token).await?;
    Ok(Json(tokens.into()))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let revoked = state.authenticator().logout(user.user_id).await?;
    Ok(Json(LogoutResponse { revoked }))
}

pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user = require_user(&state, &headers)?;
    let user = state.authenticator().profile(user.user_id).await?;
    Ok(Json(UserResponse { user }))
}
