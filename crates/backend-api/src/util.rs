use axum::http::{header::AUTHORIZATION, HeaderMap};
use backchannel_auth::AuthenticatedUser;

use crate::{ApiError, AppState};

pub fn require_bearer(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

    let mut parts = value.split_whitespace();
    let scheme = parts.next().unwrap_or("");
    if !scheme.eq_ignore_ascii_case("Bearer") {
        return Err(ApiError::unauthorized("invalid authorization scheme"));
    }

    let token = parts.next().unwrap_or("");
    if token.is_empty() {
        return Err(ApiError::unauthorized("missing bearer token"));
    }

    Ok(token.to_string())
}

/// Resolves the caller from the `Authorization` header.
pub fn require_user(state: &AppState, headers: &HeaderMap) -> Result<AuthenticatedUser, ApiError> {
    let token = require_bearer(headers)?;
    state.authenticate(&token)
}
