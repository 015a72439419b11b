//! Configuration and session storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::auth::Session;
use crate::error::{ChatError, ChatResult};

const DEFAULT_API_URL: &str = "http://localhost:3000/api";
const DEFAULT_SOCKET_URL: &str = "ws://localhost:3000";

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PAIRCHAT_CONFIG";

/// Web Push subscription registered with the notification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

impl PushSubscription {
    /// JSON shape of a browser `PushSubscription.toJSON()`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "endpoint": self.endpoint,
            "expirationTime": null,
            "keys": {
                "p256dh": self.p256dh,
                "auth": self.auth,
            }
        })
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the HTTP API (no trailing slash)
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// WebSocket URL of the real-time server
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// Display name of the other participant
    pub partner_name: Option<String>,
    /// Stored login (written at login, cleared at logout)
    pub session: Option<Session>,
    /// Optional push subscription to register after login
    pub push: Option<PushSubscription>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_socket_url() -> String {
    DEFAULT_SOCKET_URL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            socket_url: default_socket_url(),
            partner_name: None,
            session: None,
            push: None,
            path: None,
        }
    }
}

impl Config {
    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        let proj_dirs = ProjectDirs::from("com", "pairchat", "pairchat")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, falling back to defaults if absent
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).context("Failed to read config file")?;
            toml::from_str::<Config>(&content).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration back to where it was loaded from
    pub fn save(&self) -> Result<()> {
        let path = match self.path {
            Some(ref p) => p.clone(),
            None => Self::config_path()?,
        };

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains the session token)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Stored session, or an error telling the user to log in.
    pub fn require_session(&self) -> ChatResult<&Session> {
        self.session.as_ref().ok_or(ChatError::NotLoggedIn)
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn clear_session(&mut self) {
        self.session = None;
    }

    /// Base API URL without a trailing slash.
    pub fn api_base(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}
