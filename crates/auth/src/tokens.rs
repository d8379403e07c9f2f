use std::sync::Arc;

use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use sqlx::{Row, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::jwt::{JwtManager, SignedToken, TokenKind};
use crate::{parse_timestamp, timestamp, AuthError};

/// The caller behind a validated access token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Issues, validates, rotates and revokes session tokens.
///
/// Access tokens are self-contained. Refresh tokens are additionally recorded
/// in `refresh_tokens` and are single use.
#[derive(Clone)]
pub struct TokenService {
    pool: SqlitePool,
    jwt: Arc<JwtManager>,
}

impl TokenService {
    pub fn new(pool: SqlitePool, jwt: JwtManager) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
        }
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub async fn issue(&self, user_id: i64, username: &str) -> Result<TokenPair, AuthError> {
        let (pair, refresh) = self.mint(user_id, username)?;

        let mut conn = self.pool.acquire().await?;
        insert_refresh_record(&mut conn, user_id, &refresh).await?;

        debug!(user_id, "issued token pair");
        Ok(pair)
    }

    pub fn validate_access(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self
            .jwt
            .decode(token)
            .map_err(|_| AuthError::Unauthenticated)?;

        if claims.token_type != TokenKind::Access {
            return Err(AuthError::Unauthenticated);
        }

        let user_id = claims.user_id().ok_or(AuthError::Unauthenticated)?;
        Ok(AuthenticatedUser {
            user_id,
            username: claims.username,
        })
    }

    /// Exchanges a refresh token for a new pair, revoking the presented one.
    ///
    /// Only one of several concurrent calls with the same token can win; the
    /// rest fail with [`AuthError::TokenRevoked`].
    pub async fn refresh(&self, token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.decode(token).map_err(|error| match error.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        if claims.token_type != TokenKind::Refresh {
            return Err(AuthError::InvalidToken);
        }
        let user_id = claims.user_id().ok_or(AuthError::InvalidToken)?;

        let now = Utc::now();
        let record = sqlx::query("SELECT user_id, expires_at, revoked FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(record) = record else {
            return Err(AuthError::TokenNotFound);
        };

        let owner: i64 = record.try_get("user_id")?;
        let revoked: bool = record.try_get("revoked")?;
        let expires_at: String = record.try_get("expires_at")?;

        if owner != user_id {
            warn!(user_id, owner, "refresh token presented for a different user");
            return Err(AuthError::InvalidToken);
        }
        if revoked {
            warn!(user_id, "revoked refresh token presented");
            return Err(AuthError::TokenRevoked);
        }
        let expires_at = parse_timestamp(&expires_at).ok_or(AuthError::InvalidToken)?;
        if expires_at <= now {
            return Err(AuthError::TokenExpired);
        }

        let (pair, refresh) = self.mint(user_id, &claims.username)?;

        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE token = ? AND revoked = 0 AND expires_at > ?",
        )
        .bind(token)
        .bind(timestamp(&now))
        .execute(&mut *tx)
        .await?;

        if consumed.rows_affected() == 0 {
            warn!(user_id, "refresh token was rotated concurrently");
            return Err(AuthError::TokenRevoked);
        }

        insert_refresh_record(&mut *tx, user_id, &refresh).await?;
        tx.commit().await?;

        info!(user_id, "rotated refresh token");
        Ok(pair)
    }

    /// Revokes every outstanding refresh token of the user and returns how
    /// many were changed.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, AuthError> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE user_id = ? AND revoked = 0")
                .bind(user_id)
                .execute(&self.pool)
                .await?;

        info!(user_id, revoked = result.rows_affected(), "revoked refresh tokens");
        Ok(result.rows_affected())
    }

    /// Deletes refresh records that expired before `now`.
    ///
    /// Records created after `now` are never touched, so the sweep can run
    /// alongside issuance.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, AuthError> {
        let cutoff = timestamp(&now);
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ? AND created_at <= ?")
                .bind(&cutoff)
                .bind(&cutoff)
                .execute(&self.pool)
                .await?;

        info!(deleted = result.rows_affected(), "swept expired refresh tokens");
        Ok(result.rows_affected())
    }

    fn mint(&self, user_id: i64, username: &str) -> Result<(TokenPair, SignedToken), AuthError> {
        let access = self.jwt.sign(user_id, username, TokenKind::Access)?;
        let refresh = self.jwt.sign(user_id, username, TokenKind::Refresh)?;

        let pair = TokenPair {
            access_token: access.token,
            refresh_token: refresh.token.clone(),
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        };
        Ok((pair, refresh))
    }
}

async fn insert_refresh_record(
    conn: &mut SqliteConnection,
    user_id: i64,
    refresh: &SignedToken,
) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO refresh_tokens (token, user_id, expires_at, revoked, created_at) VALUES (?, ?, ?, 0, ?)",
    )
    .bind(&refresh.token)
    .bind(user_id)
    .bind(timestamp(&refresh.expires_at))
    .bind(timestamp(&Utc::now()))
    .execute(conn)
    .await?;
    Ok(())
}
