use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use chrono::Utc;
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::{timestamp, AuthError};

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    pub id: i64,
    pub public_id: String,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Account storage with argon2 password credentials.
#[derive(Clone)]
pub struct IdentityStore {
    pool: SqlitePool,
}

impl IdentityStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Identity, AuthError> {
        let username = request.username.trim();
        let email = request.email.trim().to_lowercase();
        validate_registration(username, &email, &request.password)?;

        let mut tx = self.pool.begin().await?;

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(AuthError::UsernameTaken);
        }

        let taken: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;
        if taken.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = hash_password(&request.password)?;
        let now = timestamp(&Utc::now());
        let public_id = CUID.create_id();

        let id = sqlx::query(
            "INSERT INTO users (public_id, username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(username)
        .bind(&email)
        .bind(&password_hash)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(map_unique_violation)?
        .last_insert_rowid();

        tx.commit().await?;

        info!(user = %public_id, username, "registered user");

        Ok(Identity {
            id,
            public_id,
            username: username.to_string(),
            email,
            created_at: now,
        })
    }

    /// Checks a username and password pair. Unknown users and wrong
    /// passwords fail the same way.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, AuthError> {
        let row = sqlx::query(
            "SELECT id, public_id, username, email, created_at, password_hash FROM users WHERE username = ?",
        )
        .bind(username.trim())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: String = row.try_get("password_hash")?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        map_identity(&row)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Identity, AuthError> {
        let row = sqlx::query(
            "SELECT id, public_id, username, email, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => map_identity(&row),
            None => Err(AuthError::UserNotFound),
        }
    }

    pub async fn exists_by_username(&self, username: &str) -> Result<bool, AuthError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE username = ?")
            .bind(username.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn exists_by_email(&self, email: &str) -> Result<bool, AuthError> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }
}

fn validate_registration(username: &str, email: &str, password: &str) -> Result<(), AuthError> {
    if !USERNAME_LEN.contains(&username.chars().count()) {
        return Err(AuthError::InvalidInput(
            "username must be between 3 and 50 characters".into(),
        ));
    }
    if username.chars().any(char::is_whitespace) {
        return Err(AuthError::InvalidInput(
            "username must not contain whitespace".into(),
        ));
    }
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !valid_email {
        return Err(AuthError::InvalidInput("email address is invalid".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::InvalidInput(
            "password must be at least 6 characters".into(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

fn map_unique_violation(error: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db) = &error {
        if db.is_unique_violation() {
            return if db.message().contains("users.email") {
                AuthError::EmailTaken
            } else {
                AuthError::UsernameTaken
            };
        }
    }
    AuthError::Database(error)
}

fn map_identity(row: &SqliteRow) -> Result<Identity, AuthError> {
    Ok(Identity {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}
