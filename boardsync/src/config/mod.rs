//! Configuration system for the `BoardSync` client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/boardsync/config.toml`)
//! 4. Compiled defaults
//!
//! A missing config file is not an error (defaults are used). An
//! explicit `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use crate::net::NetConfig;

/// Errors that can occur when loading client configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// No identity token was configured.
    #[error("no token configured (set --token, BOARDSYNC_TOKEN, or [connection] token)")]
    MissingToken,
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    connection: ConnectionFileConfig,
}

/// `[connection]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConnectionFileConfig {
    server_url: Option<String>,
    token: Option<String>,
    channel_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Connection-related CLI arguments, shared by every subcommand.
#[derive(clap::Args, Debug, Default, Clone)]
pub struct ClientCliArgs {
    /// WebSocket URL of the board server.
    #[arg(short, long, env = "BOARDSYNC_SERVER")]
    pub server: Option<String>,

    /// Identity token for the sync channel.
    #[arg(short, long, env = "BOARDSYNC_TOKEN")]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/boardsync/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn", env = "BOARDSYNC_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket URL of the board server.
    pub server_url: String,
    /// Identity token for the sync channel.
    pub token: String,
    /// Capacity of the command/event channels.
    pub channel_capacity: usize,
    /// Log level filter string.
    pub log_level: String,
}

impl ClientConfig {
    /// Default server URL for a locally-running board server.
    pub const DEFAULT_SERVER_URL: &'static str = "ws://127.0.0.1:9100/ws";

    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be
    /// read or parsed, or if no token is configured anywhere.
    pub fn load(cli: &ClientCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default.
    fn resolve(cli: &ClientCliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let token = cli
            .token
            .clone()
            .or_else(|| file.connection.token.clone())
            .ok_or(ConfigError::MissingToken)?;

        Ok(Self {
            server_url: cli
                .server
                .clone()
                .or_else(|| file.connection.server_url.clone())
                .unwrap_or_else(|| Self::DEFAULT_SERVER_URL.to_string()),
            token,
            channel_capacity: file.connection.channel_capacity.unwrap_or(256),
            log_level: cli.log_level.clone(),
        })
    }

    /// The per-connection networking configuration.
    #[must_use]
    pub fn net_config(&self) -> NetConfig {
        let mut net = NetConfig::new(self.server_url.clone(), self.token.clone());
        net.channel_capacity = self.channel_capacity;
        net
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file for the client.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("boardsync").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
