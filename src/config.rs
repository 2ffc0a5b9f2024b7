use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn, Level};

use crate::network::DEFAULT_PORT;

const CONFIG_DIR: &str = ".config/wiredless-bridge";
const CONFIG_FILE: &str = "bridge.toml";
const PORT_ENV: &str = "WIREDLESS_PORT";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("No home directory available")]
    NoHomeDir,
}

/// Settings of the headless bridge
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    /// UDP port the sender app targets
    pub port: u16,
    pub bind_address: IpAddr,
    /// Plug the virtual controller in at startup
    pub auto_connect_controller: bool,
    /// One of `trace`, `debug`, `info`, `warn`, `error`
    pub log_level: String,
    /// Capacity of the channel between the receive loop and the dispatcher
    pub event_buffer: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            auto_connect_controller: true,
            log_level: "info".to_string(),
            event_buffer: 100,
        }
    }
}

impl BridgeConfig {
    /// `~/.config/wiredless-bridge/bridge.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let mut path = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        Ok(path)
    }

    /// Loads the config from its default location and applies env overrides
    pub async fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        let mut config = Self::load_from(&path).await?;
        config.apply_env_override(std::env::var(PORT_ENV).ok().as_deref());
        Ok(config)
    }

    /// Reads `path`, writing the defaults there first if it does not exist
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if !exists {
            info!("No config at {}, writing defaults", path.display());
            let config = Self::default();
            config.save_to(path).await?;
            return Ok(config);
        }

        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
        }

        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Replaces the port with `value` when it parses as a port number
    pub fn apply_env_override(&mut self, value: Option<&str>) {
        let Some(value) = value else {
            return;
        };
        match value.trim().parse::<u16>() {
            Ok(port) => {
                info!("Port {} taken from {}", port, PORT_ENV);
                self.port = port;
            }
            Err(e) => warn!("Ignoring {}={:?}: {}", PORT_ENV, value, e),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Maximum tracing level, `INFO` for unknown names
    pub fn log_level(&self) -> Level {
        self.log_level.parse().unwrap_or_else(|_| {
            warn!("Unknown log level {:?}, using info", self.log_level);
            Level::INFO
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_path(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("wiredless-bridge-{}-{}", name, std::process::id()));
        path.push(CONFIG_FILE);
        path
    }

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let path = scratch_path("defaults");
        let _ = tokio::fs::remove_file(&path).await;

        let config = BridgeConfig::load_from(&path).await.unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert!(path.exists());

        let reread = BridgeConfig::load_from(&path).await.unwrap();
        assert_eq!(reread, config);
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn partial_file_falls_back_to_defaults() {
        let path = scratch_path("partial");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "port = 7000\nlog_level = \"debug\"\n")
            .await
            .unwrap();

        let config = BridgeConfig::load_from(&path).await.unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.log_level(), Level::DEBUG);
        assert!(config.auto_connect_controller);
        assert_eq!(config.bind_addr(), "0.0.0.0:7000".parse::<SocketAddr>().unwrap());
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let path = scratch_path("invalid");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "port = \"not a port\"").await.unwrap();

        let result = BridgeConfig::load_from(&path).await;
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }

    #[test]
    fn env_override_only_applies_valid_ports() {
        let mut config = BridgeConfig::default();
        config.apply_env_override(None);
        assert_eq!(config.port, DEFAULT_PORT);
        config.apply_env_override(Some("70000"));
        assert_eq!(config.port, DEFAULT_PORT);
        config.apply_env_override(Some(" 12345 "));
        assert_eq!(config.port, 12345);
    }

    #[test]
    fn unknown_log_level_means_info() {
        let config = BridgeConfig {
            log_level: "chatty".to_string(),
            ..BridgeConfig::default()
        };
        assert_eq!(config.log_level(), Level::INFO);
    }
}
