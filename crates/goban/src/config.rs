//! Configuration management for the goban server.
//!
//! This module handles loading, validation, and conversion of server configuration
//! from TOML files and command-line arguments.

use anyhow::{bail, Context, Result};
use game_server::{GameSettings, ProtocolSettings, ServerConfig, UserProfile};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network settings
    pub server: ServerSettings,
    /// Rules shared by every session
    #[serde(default)]
    pub game: GameRules,
    /// Wire protocol options
    #[serde(default)]
    pub protocol: ProtocolOptions,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Accounts loaded into the in-memory store at startup
    #[serde(default)]
    pub users: Vec<UserProfile>,
}

/// Server-specific configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest accepted frame payload, in bytes
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_frame_size() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameRules {
    /// Thinking time per player, in seconds
    #[serde(default = "default_main_time_secs")]
    pub main_time_secs: u64,
    /// Board sizes offered to players
    #[serde(default = "default_board_sizes")]
    pub board_sizes: Vec<usize>,
}

fn default_main_time_secs() -> u64 {
    600
}

fn default_board_sizes() -> Vec<usize> {
    game_server::config::DEFAULT_BOARD_SIZES.to_vec()
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            main_time_secs: default_main_time_secs(),
            board_sizes: default_board_sizes(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtocolOptions {
    /// Pre-shared secret; leave unset to keep payloads in plain text
    pub shared_secret: Option<String>,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                max_frame_size: default_max_frame_size(),
            },
            game: GameRules::default(),
            protocol: ProtocolOptions::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            users: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file, creating it with defaults if it
    /// does not exist yet.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        let bind_address: SocketAddr = self
            .server
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(ServerConfig {
            bind_address,
            max_connections: self.server.max_connections,
            max_frame_size: self.server.max_frame_size,
            game: GameSettings {
                main_time: Duration::from_secs(self.game.main_time_secs),
                board_sizes: self.game.board_sizes.clone(),
            },
            protocol: ProtocolSettings {
                shared_secret: self.protocol.shared_secret.clone(),
            },
        })
    }

    /// Validates the configuration for consistency and correctness.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            bail!("Invalid bind address: {}", self.server.bind_address);
        }
        if self.server.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self.server.max_frame_size == 0 {
            bail!("max_frame_size must be at least 1");
        }

        if self.game.main_time_secs == 0 {
            bail!("main_time_secs must be at least 1");
        }
        if self.game.board_sizes.is_empty() {
            bail!("At least one board size must be offered");
        }
        if let Some(size) = self.game.board_sizes.iter().find(|&&s| !(2..=25).contains(&s)) {
            bail!("Unsupported board size {size}; sizes must be between 2 and 25");
        }

        if matches!(self.protocol.shared_secret.as_deref(), Some("")) {
            bail!("shared_secret cannot be empty; remove it to disable the cipher");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            );
        }

        if let Some(user) = self.users.iter().find(|u| u.token.is_empty()) {
            bail!("User '{}' has an empty token", user.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.max_connections, 1000);
        assert_eq!(server_config.game.main_time, Duration::from_secs(600));
        assert!(server_config.protocol.shared_secret.is_none());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(path.exists());

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.game.board_sizes, vec![9, 13, 19]);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 50

[game]
main_time_secs = 300
board_sizes = [9, 19]

[protocol]
shared_secret = "s3cret"

[logging]
level = "debug"
json_format = true

[[users]]
token = "tok-ann"
name = "ann"
rating = 1650

[[users]]
token = "tok-bob"
name = "bob"
rating = 1420
"#;

        let temp_file = NamedTempFile::new().unwrap();
        tokio::fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.max_connections, 50);
        assert_eq!(config.server.max_frame_size, 64 * 1024);
        assert_eq!(config.game.board_sizes, vec![9, 19]);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.users.len(), 2);
        assert_eq!(config.users[0].rating, 1650);

        let server_config = config.to_server_config().unwrap();
        assert_eq!(server_config.game.main_time, Duration::from_secs(300));
        assert_eq!(server_config.protocol.shared_secret.as_deref(), Some("s3cret"));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = AppConfig::default();
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());
        assert!(config.to_server_config().is_err());

        let mut config = AppConfig::default();
        config.game.board_sizes = vec![9, 1];
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.game.board_sizes.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.protocol.shared_secret = Some(String::new());
        assert!(config.validate().is_err());
    }
}
