use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_CONFIG_FILES: &[&str] = &[
    "backchannel.toml",
    "config/backchannel.toml",
    "crates/config/backchannel.toml",
    "../backchannel.toml",
    "../config/backchannel.toml",
];

pub const CONFIG_PATH_ENV: &str = "BACKCHANNEL_CONFIG";
pub const ENV_PREFIX: &str = "BACKCHANNEL";

/// Upper bound for token lifetimes, roughly 100 years.
pub const MAX_TOKEN_TTL_SECONDS: u64 = 100 * 365 * 86_400;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub encryption: EncryptionConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(),
            port: 7070,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://backchannel.db".to_string(),
            max_connections: 10,
        }
    }
}

/// Token signing and lifetime settings.
///
/// ```
/// use backchannel_config::AuthConfig;
///
/// let auth = AuthConfig::default();
/// assert_eq!(auth.access_token_ttl_seconds, 900);
/// assert_eq!(auth.refresh_token_ttl_seconds, 604_800);
/// assert!(auth.jwt_secret.is_none());
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for access and refresh tokens. A random secret is
    /// generated per process when unset.
    pub jwt_secret: Option<String>,
    pub issuer: String,
    pub audience: String,
    pub access_token_ttl_seconds: u64,
    pub refresh_token_ttl_seconds: u64,
    /// How often the runtime deletes expired refresh tokens.
    pub sweep_interval_seconds: u64,
}

impl AuthConfig {
    const fn default_access_ttl() -> u64 {
        900
    }

    const fn default_refresh_ttl() -> u64 {
        604_800
    }

    const fn default_sweep_interval() -> u64 {
        86_400
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            issuer: "backchannel".to_string(),
            audience: "backchannel-clients".to_string(),
            access_token_ttl_seconds: Self::default_access_ttl(),
            refresh_token_ttl_seconds: Self::default_refresh_ttl(),
            sweep_interval_seconds: Self::default_sweep_interval(),
        }
    }
}

// Keeps the secret out of `debug!(?config)`.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_ttl_seconds", &self.access_token_ttl_seconds)
            .field("refresh_token_ttl_seconds", &self.refresh_token_ttl_seconds)
            .field("sweep_interval_seconds", &self.sweep_interval_seconds)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// Base64 encoded 32 byte AES-256-GCM key for message bodies.
    pub key: Option<String>,
}

impl std::fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionConfig")
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Per-room broadcast buffer. Subscribers that fall further behind lose
    /// the oldest events.
    pub channel_capacity: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// Load the application configuration by combining defaults, files, and environment overrides.
///
/// ```
/// use backchannel_config::load;
///
/// std::env::remove_var("BACKCHANNEL_CONFIG");
///
/// let config = load().expect("configuration should load with defaults");
/// assert!(!config.http.address.is_empty());
/// ```
pub fn load() -> anyhow::Result<AppConfig> {
    let defaults = AppConfig::default();

    let mut builder = config::Config::builder()
        .set_default("http.address", defaults.http.address.clone())?
        .set_default("http.port", i64::from(defaults.http.port))?
        .set_default("database.url", defaults.database.url.clone())?
        .set_default(
            "database.max_connections",
            i64::from(defaults.database.max_connections),
        )?
        .set_default("auth.issuer", defaults.auth.issuer.clone())?
        .set_default("auth.audience", defaults.auth.audience.clone())?;

    let mut config_file_attached = false;

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        builder = builder.add_source(config::File::from(PathBuf::from(&path)));
        config_file_attached = true;
        debug!(path, "loading configuration via BACKCHANNEL_CONFIG");
    } else if let Ok(cwd) = std::env::current_dir() {
        let fallback = DEFAULT_CONFIG_FILES
            .iter()
            .map(|candidate| cwd.join(candidate))
            .find(|path| path.exists());

        if let Some(path) = fallback {
            debug!(path = %path.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(path));
            config_file_attached = true;
        }
    }

    if !config_file_attached {
        debug!("no configuration file found, relying on defaults and environment overrides");
    }

    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"));

    let cfg = builder.build().context("unable to build configuration")?;

    let config = cfg
        .try_deserialize::<AppConfig>()
        .context("invalid configuration")?;

    validate(&config)?;

    debug!(?config, "loaded backend configuration");
    Ok(config)
}

fn validate(config: &AppConfig) -> anyhow::Result<()> {
    let auth = &config.auth;
    ensure!(
        auth.access_token_ttl_seconds > 0,
        "auth.access_token_ttl_seconds must be positive"
    );
    ensure!(
        auth.refresh_token_ttl_seconds > auth.access_token_ttl_seconds,
        "auth.refresh_token_ttl_seconds must exceed the access token ttl"
    );
    ensure!(
        auth.refresh_token_ttl_seconds <= MAX_TOKEN_TTL_SECONDS,
        "auth.refresh_token_ttl_seconds must not exceed {MAX_TOKEN_TTL_SECONDS}"
    );
    ensure!(
        auth.sweep_interval_seconds > 0,
        "auth.sweep_interval_seconds must be positive"
    );
    ensure!(
        config.realtime.channel_capacity > 0,
        "realtime.channel_capacity must be positive"
    );
    ensure!(
        config.database.max_connections > 0,
        "database.max_connections must be positive"
    );
    Ok(())
}
