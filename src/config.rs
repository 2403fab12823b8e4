//! Configuration system for the AM2R connector
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (AM2R_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::session::SessionConfig;
use crate::sync::SyncConfig;

/// Main connector configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorConfig {
    /// Local game link
    pub game: GameSettings,

    /// Multiworld server session
    pub server: ServerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Local game link settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    /// Host the game listens on
    pub host: String,

    /// Port the game listens on
    pub port: u16,

    /// Dial timeout in milliseconds
    pub dial_timeout_ms: u64,

    /// Write flush timeout in milliseconds
    pub write_timeout_ms: u64,

    /// Response timeout in milliseconds
    pub read_timeout_ms: u64,

    /// Pause after a failed dial in milliseconds (0 = retry immediately)
    pub retry_interval_ms: u64,
}

/// Multiworld server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server WebSocket URL (empty = no server session)
    pub url: String,

    /// Slot name to connect as
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Room password
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,

    /// Initial reconnection interval in milliseconds
    pub reconnect_interval_ms: u64,

    /// Upper bound for the reconnection interval in milliseconds
    pub max_reconnect_delay_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (None = console only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// File rotation: daily, hourly, never
    pub rotation: String,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Use JSON format for logs
    pub json_format: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 64197,
            dial_timeout_ms: 10_000,
            write_timeout_ms: 1_500,
            read_timeout_ms: 5_000,
            retry_interval_ms: 1_000,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            name: None,
            password: None,
            connect_timeout_ms: 10_000,
            reconnect_interval_ms: 1_000,
            max_reconnect_delay_ms: 30_000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            rotation: "daily".to_string(),
            max_files: 5,
            json_format: false,
        }
    }
}

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const VALID_ROTATIONS: [&str; 3] = ["daily", "hourly", "never"];

impl ConnectorConfig {
    /// Load configuration from all sources
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a single configuration file without overrides or validation
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&content).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        info!(path = %path.display(), "Configuration loaded from file");
        Ok(config)
    }

    /// Find the configuration file, searching standard locations
    pub fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            // Current directory
            Some(PathBuf::from("am2r-connector.toml")),
            // User config directory
            dirs::config_dir().map(|p| p.join("am2r").join("connector.toml")),
            // Home directory
            dirs::home_dir().map(|p| p.join(".am2r").join("connector.toml")),
        ];

        for path in search_paths.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Game settings
        if let Ok(val) = std::env::var("AM2R_GAME_HOST") {
            self.game.host = val;
        }
        env_parse("AM2R_GAME_PORT", &mut self.game.port);
        env_parse("AM2R_DIAL_TIMEOUT_MS", &mut self.game.dial_timeout_ms);
        env_parse("AM2R_WRITE_TIMEOUT_MS", &mut self.game.write_timeout_ms);
        env_parse("AM2R_READ_TIMEOUT_MS", &mut self.game.read_timeout_ms);
        env_parse("AM2R_RETRY_INTERVAL_MS", &mut self.game.retry_interval_ms);

        // Server settings
        if let Ok(val) = std::env::var("AM2R_SERVER_URL") {
            self.server.url = val;
        }
        if let Ok(val) = std::env::var("AM2R_SLOT_NAME") {
            self.server.name = Some(val);
        }
        if let Ok(val) = std::env::var("AM2R_PASSWORD") {
            self.server.password = Some(val);
        }

        // Logging settings
        if let Ok(val) = std::env::var("AM2R_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("AM2R_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("AM2R_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.game.host.is_empty() {
            return Err(Error::config_field_invalid("game.host", "cannot be empty"));
        }
        if self.game.port == 0 {
            return Err(Error::config_field_invalid("game.port", "must be non-zero"));
        }

        let timeouts = [
            ("game.dial_timeout_ms", self.game.dial_timeout_ms),
            ("game.write_timeout_ms", self.game.write_timeout_ms),
            ("game.read_timeout_ms", self.game.read_timeout_ms),
            ("server.connect_timeout_ms", self.server.connect_timeout_ms),
            ("server.reconnect_interval_ms", self.server.reconnect_interval_ms),
        ];
        for (field, value) in timeouts {
            if value == 0 {
                return Err(Error::config_field_invalid(field, "must be greater than 0"));
            }
        }
        if self.server.max_reconnect_delay_ms < self.server.reconnect_interval_ms {
            return Err(Error::config_field_invalid(
                "server.max_reconnect_delay_ms",
                "must not be below reconnect_interval_ms",
            ));
        }

        if self.server_enabled()
            && !self.server.url.starts_with("ws://")
            && !self.server.url.starts_with("wss://")
        {
            return Err(Error::config_field_invalid(
                "server.url",
                "must start with ws:// or wss://",
            ));
        }

        if !VALID_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "'{}' is not one of: {}",
                    self.logging.level,
                    VALID_LEVELS.join(", ")
                ),
            ));
        }
        if !VALID_ROTATIONS.contains(&self.logging.rotation.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.rotation",
                format!(
                    "'{}' is not one of: {}",
                    self.logging.rotation,
                    VALID_ROTATIONS.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Whether a multiworld server session should be started
    pub fn server_enabled(&self) -> bool {
        !self.server.url.is_empty()
    }

    /// Timing and address for the game sync loop
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            host: self.game.host.clone(),
            port: self.game.port,
            dial_timeout: Duration::from_millis(self.game.dial_timeout_ms),
            write_timeout: Duration::from_millis(self.game.write_timeout_ms),
            read_timeout: Duration::from_millis(self.game.read_timeout_ms),
            retry_interval: Duration::from_millis(self.game.retry_interval_ms),
        }
    }

    /// Settings for the multiworld server session
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.server.url.clone(),
            slot_name: self.server.name.clone(),
            password: self.server.password.clone(),
            connect_timeout: Duration::from_millis(self.server.connect_timeout_ms),
            initial_reconnect_delay: Duration::from_millis(self.server.reconnect_interval_ms),
            max_reconnect_delay: Duration::from_millis(self.server.max_reconnect_delay_ms),
        }
    }
}

/// Overwrite `target` when `key` is set and parses
fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => debug!(key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

/// Expand ~ and environment variables in a path
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for `config init`
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".am2r")
        .join("connector.toml")
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| Error::IoWrite {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    fs::write(&config_path, generate_default_config()).map_err(|source| Error::IoWrite {
        path: config_path.clone(),
        source,
    })?;

    Ok(config_path)
}

/// Generate default configuration file content with comments
pub fn generate_default_config() -> String {
    r#"# AM2R Connector Configuration

[game]
# Address the game listens on
host = "127.0.0.1"
port = 64197

# Dial timeout in milliseconds
dial_timeout_ms = 10000

# Request flush timeout in milliseconds
write_timeout_ms = 1500

# Response timeout in milliseconds
read_timeout_ms = 5000

# Pause after a failed dial in milliseconds (0 = retry immediately)
retry_interval_ms = 1000

[server]
# Multiworld server WebSocket URL (leave empty to only sync with the game)
url = ""

# Slot name to connect as
# name = "Samus"

# Room password
# password = ""

# Connection timeout in milliseconds
connect_timeout_ms = 10000

# Initial reconnection interval in milliseconds
reconnect_interval_ms = 1000

# Upper bound for the reconnection interval in milliseconds
max_reconnect_delay_ms = 30000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.am2r/logs/connector.log"

# File rotation: daily, hourly, never
rotation = "daily"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}
