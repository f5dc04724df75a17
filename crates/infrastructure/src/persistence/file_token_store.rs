//! File-based token store.
//!
//! The session lives in the platform-specific config directory unless
//! another directory is configured:
//! - Linux: ~/.config/clinic-session/session.json
//! - macOS: ~/Library/Application Support/clinic-session/session.json
//! - Windows: %APPDATA%/clinic-session/session.json

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clinic_session_application::ports::{StoreError, TokenStore};
use clinic_session_domain::{Credential, ExpiryWindow, PersistedSession};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::serialization::{from_json_bytes, to_json_stable_bytes};

const SESSION_FILE: &str = "session.json";
const PROFILE_FILE: &str = "profile.json";

/// On-disk shape of `session.json`.
///
/// Every field is optional so that a file written by hand, or truncated by
/// an older writer, still parses and is then rejected as incomplete.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_expires_at: Option<DateTime<Utc>>,
}

impl SessionFile {
    fn from_session(session: &PersistedSession) -> Self {
        Self {
            access_token: Some(session.credential.access_token.clone()),
            refresh_token: Some(session.credential.refresh_token.clone()),
            access_expires_at: session.expiry.map(|w| w.access_expires_at),
            refresh_expires_at: session.expiry.map(|w| w.refresh_expires_at),
        }
    }

    fn into_session(self) -> Option<PersistedSession> {
        let credential = Credential::from_parts(self.access_token, self.refresh_token)?;
        let expiry = match (self.access_expires_at, self.refresh_expires_at) {
            (Some(access_expires_at), Some(refresh_expires_at)) => Some(ExpiryWindow {
                access_expires_at,
                refresh_expires_at,
            }),
            _ => None,
        };
        Some(PersistedSession::new(credential, expiry))
    }
}

/// Token store keeping `session.json` and `profile.json` in one directory.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    /// Creates a store rooted at `dir`. The directory is created on first
    /// write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the default storage directory, if the platform has one.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("clinic-session"))
    }

    /// The directory this store writes to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn session_path(&self) -> PathBuf {
        self.dir.join(SESSION_FILE)
    }

    fn profile_path(&self) -> PathBuf {
        self.dir.join(PROFILE_FILE)
    }

    /// Writes `content` next to `path` and renames it into place, so a
    /// reader sees either the old file or the new one.
    async fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        restrict_permissions(&tmp).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match fs::read(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Io(e)),
    }
}

async fn remove_optional(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(StoreError::Io(e)),
        _ => Ok(()),
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn save(&self, session: &PersistedSession) -> Result<(), StoreError> {
        let content = to_json_stable_bytes(&SessionFile::from_session(session))
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_atomic(&self.session_path(), &content).await
    }

    async fn load(&self) -> Result<Option<PersistedSession>, StoreError> {
        let path = self.session_path();
        let Some(content) = read_optional(&path).await? else {
            return Ok(None);
        };

        let file: SessionFile =
            from_json_bytes(&content).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let session = file.into_session();
        if session.is_none() {
            warn!(path = %path.display(), "ignoring incomplete stored session");
        }
        Ok(session)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        remove_optional(&self.session_path()).await?;
        remove_optional(&self.profile_path()).await
    }

    async fn save_profile(&self, profile: &serde_json::Value) -> Result<(), StoreError> {
        let content =
            to_json_stable_bytes(profile).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.write_atomic(&self.profile_path(), &content).await
    }

    async fn load_profile(&self) -> Result<Option<serde_json::Value>, StoreError> {
        let Some(content) = read_optional(&self.profile_path()).await? else {
            return Ok(None);
        };
        from_json_bytes(&content)
            .map(Some)
            .map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
