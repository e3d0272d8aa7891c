//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::websocket::{ConnectionSettings, HubConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub websocket: WebSocketConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_web_root")]
    pub web_root: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_web_root() -> String {
    "./web".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            web_root: default_web_root(),
        }
    }
}

/// Connection hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    #[serde(default = "default_outbound_capacity")]
    pub outbound_capacity: usize,

    /// 0 disables the write deadline
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,

    /// 0 disables the idle read deadline
    #[serde(default)]
    pub read_timeout_secs: u64,

    /// 0 keeps the WebSocket library default
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_outbound_capacity() -> usize {
    256
}

fn default_write_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_max_message_size() -> usize {
    64 * 1024 // 64 KB
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            outbound_capacity: default_outbound_capacity(),
            write_timeout_ms: default_write_timeout(),
            read_timeout_secs: 0,
            max_message_size: default_max_message_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("orderhub").join("config.toml")),
            Some(PathBuf::from("/etc/orderhub/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Settings for the connection registry
    pub fn hub_config(&self) -> HubConfig {
        let ws = &self.websocket;
        HubConfig {
            max_connections: ws.max_connections,
            connection: ConnectionSettings {
                outbound_capacity: ws.outbound_capacity,
                write_timeout: (ws.write_timeout_ms > 0)
                    .then(|| Duration::from_millis(ws.write_timeout_ms)),
                read_timeout: (ws.read_timeout_secs > 0)
                    .then(|| Duration::from_secs(ws.read_timeout_secs)),
            },
        }
    }

    /// Settings for the HTTP server
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.server.host.clone(),
            port: self.server.port,
            web_root: PathBuf::from(&self.server.web_root),
            max_message_size: self.websocket.max_message_size,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = var("ORDERHUB_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("ORDERHUB_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!("Ignoring invalid ORDERHUB_PORT {:?}", port),
            }
        }
        if let Some(web_root) = var("ORDERHUB_WEB_ROOT") {
            self.server.web_root = web_root;
        }

        // WebSocket overrides
        if let Some(max) = var("ORDERHUB_MAX_CONNECTIONS") {
            match max.parse() {
                Ok(n) => self.websocket.max_connections = n,
                Err(_) => tracing::warn!("Ignoring invalid ORDERHUB_MAX_CONNECTIONS {:?}", max),
            }
        }

        // Logging overrides
        if let Some(level) = var("ORDERHUB_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("ORDERHUB_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Orderhub Configuration
#
# Environment variables override these settings:
# - ORDERHUB_HOST
# - ORDERHUB_PORT
# - ORDERHUB_WEB_ROOT
# - ORDERHUB_MAX_CONNECTIONS
# - ORDERHUB_LOG_LEVEL
# - ORDERHUB_LOG_FORMAT

[server]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 8080

# Directory holding order_table.html, order_creation.html, js/ and img/
web_root = "./web"

[websocket]
# Maximum number of concurrent connections
max_connections = 1000

# Frames that may queue for one connection before new ones are dropped
outbound_capacity = 256

# Give up on a single write after this long (ms, 0 = never)
write_timeout_ms = 10000

# Close connections that send nothing for this long (seconds, 0 = never)
read_timeout_secs = 0

# Largest inbound message in bytes (0 = library default)
max_message_size = 65536

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.websocket.max_connections, 1000);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_matches_defaults() {
        let parsed: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(parsed.server.host, defaults.server.host);
        assert_eq!(parsed.server.port, defaults.server.port);
        assert_eq!(parsed.server.web_root, defaults.server.web_root);
        assert_eq!(parsed.websocket.outbound_capacity, defaults.websocket.outbound_capacity);
        assert_eq!(parsed.websocket.write_timeout_ms, defaults.websocket.write_timeout_ms);
        assert_eq!(parsed.websocket.max_message_size, defaults.websocket.max_message_size);
        assert_eq!(parsed.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 9000\n\n[websocket]\nread_timeout_secs = 30").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.websocket.read_timeout_secs, 30);
        assert_eq!(config.websocket.outbound_capacity, 256);
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("ORDERHUB_HOST", "127.0.0.1"),
            ("ORDERHUB_PORT", "9100"),
            ("ORDERHUB_MAX_CONNECTIONS", "many"),
            ("ORDERHUB_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9100);
        // Unparseable values are ignored.
        assert_eq!(config.websocket.max_connections, 1000);
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_hub_config_zero_disables_timeouts() {
        let mut config = Config::default();
        config.websocket.write_timeout_ms = 0;
        config.websocket.read_timeout_secs = 0;
        config.websocket.max_connections = 3;

        let hub = config.hub_config();
        assert_eq!(hub.max_connections, 3);
        assert!(hub.connection.write_timeout.is_none());
        assert!(hub.connection.read_timeout.is_none());

        config.websocket.read_timeout_secs = 5;
        assert_eq!(
            config.hub_config().connection.read_timeout,
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn test_api_config() {
        let mut config = Config::default();
        config.server.web_root = "/srv/board".to_string();

        let api = config.api_config();
        assert_eq!(api.addr(), "0.0.0.0:8080");
        assert_eq!(api.web_root, PathBuf::from("/srv/board"));
        assert_eq!(api.max_message_size, 65536);
    }
}
