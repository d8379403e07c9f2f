use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use backchannel_config::AuthConfig;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rand::RngCore;
use sqlx::SqlitePool;
use tracing::{info, warn};

mod error;
mod identity;
pub mod jwt;
mod tokens;

pub use error::AuthError;
pub use identity::{Identity, IdentityStore, RegisterRequest};
pub use jwt::{Claims, JwtManager, TokenKind};
pub use tokens::{AuthenticatedUser, TokenPair, TokenService};

/// A signed-in user and the tokens minted for them.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: Identity,
    pub tokens: TokenPair,
}

/// Account registration, sign-in and session token handling.
#[derive(Clone)]
pub struct Authenticator {
    identities: IdentityStore,
    tokens: TokenService,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        let secret = match &config.jwt_secret {
            Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
            _ => {
                warn!("auth.jwt_secret is not configured, signing tokens with a per-process random secret");
                random_secret()
            }
        };

        let jwt = JwtManager::new(&secret, config.issuer.clone(), config.audience.clone()).with_ttls(
            seconds(config.access_token_ttl_seconds),
            seconds(config.refresh_token_ttl_seconds),
        );

        Self {
            identities: IdentityStore::new(pool.clone()),
            tokens: TokenService::new(pool, jwt),
        }
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Identity, AuthError> {
        self.identities.register(request).await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, AuthError> {
        let user = self.identities.verify_credentials(username, password).await?;
        let tokens = self.tokens.issue(user.id, &user.username).await?;

        info!(user = %user.public_id, "user signed in");
        Ok(AuthSession { user, tokens })
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        self.tokens.refresh(refresh_token).await
    }

    /// Revokes every refresh token the user holds.
    pub async fn logout(&self, user_id: i64) -> Result<u64, AuthError> {
        self.tokens.revoke_all(user_id).await
    }

    pub fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.tokens.validate_access(access_token)
    }

    pub async fn profile(&self, user_id: i64) -> Result<Identity, AuthError> {
        self.identities.find_by_id(user_id).await
    }

    pub async fn sweep_expired_tokens(&self) -> Result<u64, AuthError> {
        self.tokens.sweep_expired(Utc::now()).await
    }
}

/// Saturates instead of panicking on values chrono cannot represent.
fn seconds(value: u64) -> Duration {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

fn random_secret() -> Vec<u8> {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes).into_bytes()
}

/// Fixed-width RFC 3339 so that stored expiries compare correctly as text.
pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_round_trip() {
        let now = Utc::now();
        let parsed = parse_timestamp(&timestamp(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[test]
    fn oversized_ttls_saturate() {
        assert_eq!(seconds(900), Duration::seconds(900));
        assert_eq!(seconds(u64::MAX), Duration::MAX);
        assert_eq!(seconds(100_000_000_000_000_000), Duration::MAX);
    }

    #[test]
    fn random_secrets_differ() {
        assert_ne!(random_secret(), random_secret());
    }
}
