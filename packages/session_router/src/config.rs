use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::protocol::Credentials;

// =============================================================================
// Attach client config (figment-deserialized from defaults / config.toml / env)
// =============================================================================
//
//   config.toml:     [server]
//                    base_url = "wss://sessions.example.com"
//
//   env var:         SESSION_ROUTER_SERVER__BASE_URL=wss://...   (double underscore = nesting)

pub const ENV_PREFIX: &str = "SESSION_ROUTER_";

/// Placeholder replaced by the session id in `server.session_path`.
pub const SESSION_ID_PLACEHOLDER: &str = "{session_id}";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerFileConfig,
    #[serde(default)]
    pub reconnect: ReconnectFileConfig,
}

/// Where sessions live (under `[server]` in config.toml).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_session_path")]
    pub session_path: String,
}

impl Default for ServerFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_path: default_session_path(),
        }
    }
}

/// Credentials offered when a dropped session was not saved server-side
/// (under `[reconnect]` in config.toml).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ReconnectFileConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub passphrase: Option<String>,
}

impl ReconnectFileConfig {
    /// `None` when nothing is configured.
    pub fn credentials(&self) -> Option<Credentials> {
        let creds = Credentials {
            username: non_empty(&self.username),
            password: non_empty(&self.password),
            private_key: non_empty(&self.private_key),
            passphrase: non_empty(&self.passphrase),
        };
        if creds == Credentials::default() {
            None
        } else {
            Some(creds)
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn default_base_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_session_path() -> String {
    format!("/ws/session/{}/", SESSION_ID_PLACEHOLDER)
}

impl ServerFileConfig {
    /// Resolve a target to a socket URL. Full `ws://`/`wss://` URLs pass
    /// through; anything else is a session id.
    pub fn session_url(&self, target: &str) -> String {
        if target.starts_with("ws://") || target.starts_with("wss://") {
            return target.to_string();
        }
        let path = self.session_path.replace(SESSION_ID_PLACEHOLDER, target);
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Build a figment that layers: defaults → config.toml → SESSION_ROUTER_* env vars.
pub fn load_config(config_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(config_dir.join("config.toml")))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Directory holding config.toml. Defaults to `~/.session-router`.
pub fn config_dir(custom_dir: Option<PathBuf>) -> Result<PathBuf> {
    match custom_dir {
        Some(dir) => Ok(dir),
        None => dirs::home_dir()
            .map(|home| home.join(".session-router"))
            .context("Could not find home directory"),
    }
}
