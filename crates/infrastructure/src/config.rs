//! Session manager configuration.
//!
//! Values come from `<config_dir>/clinic-session/config.json` when it
//! exists, then from `CLINIC_*` environment variables, which win.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clinic_session_application::SessionSettings;
use clinic_session_application::auth::{DEFAULT_EXCHANGE_TIMEOUT, DEFAULT_LEAD_TIME};
use serde::Deserialize;
use tokio::fs;
use url::Url;

use crate::persistence::FileTokenStore;
use crate::serialization::{SerializationError, from_json_bytes};

/// Environment variable overriding `token_endpoint`.
pub const ENV_TOKEN_URL: &str = "CLINIC_TOKEN_URL";
/// Environment variable overriding `client_id`.
pub const ENV_CLIENT_ID: &str = "CLINIC_CLIENT_ID";
/// Environment variable overriding `client_secret`.
pub const ENV_CLIENT_SECRET: &str = "CLINIC_CLIENT_SECRET";
/// Environment variable overriding `storage_dir`.
pub const ENV_SESSION_DIR: &str = "CLINIC_SESSION_DIR";
/// Environment variable overriding `refresh_lead_secs`.
pub const ENV_REFRESH_LEAD_SECS: &str = "CLINIC_REFRESH_LEAD_SECS";
/// Environment variable overriding `exchange_timeout_secs`.
pub const ENV_EXCHANGE_TIMEOUT_SECS: &str = "CLINIC_EXCHANGE_TIMEOUT_SECS";

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error while reading the config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON.
    #[error("Invalid config file: {0}")]
    Serialization(#[from] SerializationError),

    /// A required value was not provided.
    #[error("Missing configuration value: {0}")]
    Missing(&'static str),

    /// The token endpoint is not a valid URL.
    #[error("Invalid token endpoint {value:?}: {source}")]
    InvalidUrl {
        /// The rejected value.
        value: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// A numeric setting could not be parsed.
    #[error("Invalid value for {key}: {value:?}")]
    InvalidNumber {
        /// Setting name.
        key: &'static str,
        /// The rejected value.
        value: String,
    },

    /// No storage directory was given and the platform has no config dir.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Config file contents; every field may be overridden from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    token_endpoint: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    storage_dir: Option<PathBuf>,
    refresh_lead_secs: Option<u64>,
    exchange_timeout_secs: Option<u64>,
}

/// Resolved configuration of the session manager.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Identity provider token endpoint.
    pub token_endpoint: Url,
    /// OAuth client id.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: String,
    /// Directory holding `session.json` and `profile.json`.
    pub storage_dir: PathBuf,
    /// Seconds before access-token expiry at which the refresh fires.
    pub refresh_lead_secs: u64,
    /// Upper bound, in seconds, on a single token exchange.
    pub exchange_timeout_secs: u64,
}

impl SessionConfig {
    /// Loads the config file from the default location and applies
    /// environment overrides.
    ///
    /// # Errors
    /// Returns an error if the file is unreadable or a value is missing or
    /// invalid.
    pub async fn load() -> Result<Self, ConfigError> {
        let path = FileTokenStore::default_dir().map(|dir| dir.join("config.json"));
        Self::from_sources(path.as_deref(), |key| std::env::var(key).ok()).await
    }

    /// Builds the configuration from an optional config file and an
    /// environment lookup.
    ///
    /// A missing file is treated as empty.
    ///
    /// # Errors
    /// Same as [`Self::load`].
    pub async fn from_sources<E>(path: Option<&Path>, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let file = match path {
            Some(path) => read_config_file(path).await?,
            None => ConfigFile::default(),
        };

        let token_endpoint = env(ENV_TOKEN_URL)
            .or(file.token_endpoint)
            .ok_or(ConfigError::Missing("token_endpoint"))?;
        let token_endpoint =
            Url::parse(&token_endpoint).map_err(|source| ConfigError::InvalidUrl {
                value: token_endpoint.clone(),
                source,
            })?;

        let client_id = env(ENV_CLIENT_ID)
            .or(file.client_id)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("client_id"))?;
        let client_secret = env(ENV_CLIENT_SECRET)
            .or(file.client_secret)
            .ok_or(ConfigError::Missing("client_secret"))?;

        let storage_dir = match env(ENV_SESSION_DIR).map(PathBuf::from).or(file.storage_dir) {
            Some(dir) => dir,
            None => FileTokenStore::default_dir().ok_or(ConfigError::NoConfigDir)?,
        };

        let refresh_lead_secs = secs_override(&env, ENV_REFRESH_LEAD_SECS)?
            .or(file.refresh_lead_secs)
            .unwrap_or(DEFAULT_LEAD_TIME.as_secs());
        let exchange_timeout_secs = secs_override(&env, ENV_EXCHANGE_TIMEOUT_SECS)?
            .or(file.exchange_timeout_secs)
            .unwrap_or(DEFAULT_EXCHANGE_TIMEOUT.as_secs());
        if exchange_timeout_secs == 0 {
            // A zero timeout fails every exchange before it is sent.
            return Err(ConfigError::InvalidNumber {
                key: "exchange_timeout_secs",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            token_endpoint,
            client_id,
            client_secret,
            storage_dir,
            refresh_lead_secs,
            exchange_timeout_secs,
        })
    }

    /// Timing settings for the session manager.
    #[must_use]
    pub const fn settings(&self) -> SessionSettings {
        SessionSettings {
            lead_time: Duration::from_secs(self.refresh_lead_secs),
            exchange_timeout: self.exchange_timeout(),
        }
    }

    /// Exchange timeout as a duration.
    #[must_use]
    pub const fn exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.exchange_timeout_secs)
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("token_endpoint", &self.token_endpoint.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("storage_dir", &self.storage_dir)
            .field("refresh_lead_secs", &self.refresh_lead_secs)
            .field("exchange_timeout_secs", &self.exchange_timeout_secs)
            .finish()
    }
}

async fn read_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    match fs::read(path).await {
        Ok(content) => Ok(from_json_bytes(&content)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(err) => Err(err.into()),
    }
}

fn secs_override<E>(env: &E, key: &'static str) -> Result<Option<u64>, ConfigError>
where
    E: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidNumber { key, value })
        })
        .transpose()
}
