//! Client configuration model, defaults and `config.toml` loading.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{info, warn};

use crate::error::{CslError, Result};
use crate::pagination::{
    PageLimits, DEFAULT_BATCH_SIZE, DEFAULT_MAX_BATCH_SIZE, DEFAULT_MAX_QUERY_SIZE,
};

pub const DEFAULT_BASE_URL: &str = "https://amqbot.082640.xyz";
pub const DEFAULT_SESSION_PATH: &str = "amq_session.txt";
const CONFIG_DIR_NAME: &str = "amqcsl";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Root configuration persisted to `config.toml`.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub username: Option<String>,
    /// Plain-text fallback; the keyring is preferred.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_max_query_size")]
    pub max_query_size: usize,
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            session_path: default_session_path(),
            max_batch_size: default_max_batch_size(),
            max_query_size: default_max_query_size(),
            default_batch_size: default_batch_size(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("session_path", &self.session_path)
            .field("max_batch_size", &self.max_batch_size)
            .field("max_query_size", &self.max_query_size)
            .field("default_batch_size", &self.default_batch_size)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("read_timeout_secs", &self.read_timeout_secs)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl ClientConfig {
    /// Clamps values the client cannot work with.
    pub fn sanitized(self) -> Self {
        let max_batch_size = self.max_batch_size.max(1);
        let default_batch_size = self.default_batch_size.clamp(1, max_batch_size);
        if default_batch_size != self.default_batch_size {
            warn!(
                "default_batch_size {} outside 1..={}, using {}",
                self.default_batch_size, max_batch_size, default_batch_size
            );
        }
        let max_query_size = self.max_query_size.max(max_batch_size);
        if max_query_size != self.max_query_size {
            warn!(
                "max_query_size {} below max_batch_size, using {}",
                self.max_query_size, max_query_size
            );
        }
        let base_url = self.base_url.trim_end_matches('/').to_string();
        Self {
            base_url,
            max_batch_size,
            max_query_size,
            default_batch_size,
            connect_timeout_secs: self.connect_timeout_secs.max(1),
            read_timeout_secs: self.read_timeout_secs.max(1),
            ..self
        }
    }

    pub fn limits(&self) -> PageLimits {
        PageLimits {
            max_batch_size: self.max_batch_size,
            max_query_size: self.max_query_size,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log_level {:?}, using info", self.log_level);
            log::LevelFilter::Info
        })
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_session_path() -> PathBuf {
    PathBuf::from(DEFAULT_SESSION_PATH)
}

fn default_max_batch_size() -> usize {
    DEFAULT_MAX_BATCH_SIZE
}

fn default_max_query_size() -> usize {
    DEFAULT_MAX_QUERY_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    5
}

fn default_read_timeout_secs() -> u64 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `<config dir>/amqcsl/config.toml`, when the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Loads and sanitizes a config file. A missing file yields defaults.
pub fn load_config_file(path: &Path) -> Result<ClientConfig> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!("No config at {}, using defaults", path.display());
            return Ok(ClientConfig::default());
        }
        Err(err) => return Err(err.into()),
    };
    toml::from_str::<ClientConfig>(&text)
        .map(ClientConfig::sanitized)
        .map_err(|err| CslError::Config(format!("{}: {}", path.display(), err)))
}

/// Writes a default config file if none exists yet.
pub fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = toml::to_string(&ClientConfig::default())
        .map_err(|err| CslError::Config(format!("failed to serialize default config: {err}")))?;
    std::fs::write(path, text)?;
    info!("Wrote default config to {}", path.display());
    Ok(())
}
