//! Configuration management for nodeboot

pub mod schema;

pub use schema::Config;

use crate::error::{NodebootError, NodebootResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Node-wide config written by instance provisioning
pub const SYSTEM_CONFIG_PATH: &str = "/etc/nodeboot/config.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    ///
    /// The per-user file wins when it exists. Otherwise a node-wide file under
    /// `/etc/nodeboot` is used, so boot scripts running as root pick up the
    /// configuration the instance was provisioned with.
    pub fn default_config_path() -> PathBuf {
        Self::pick_default_path(dirs::config_dir(), Path::new(SYSTEM_CONFIG_PATH))
    }

    fn pick_default_path(user_config_dir: Option<PathBuf>, system: &Path) -> PathBuf {
        let user = user_config_dir.map(|dir| dir.join("nodeboot").join("config.toml"));

        match user {
            Some(user) if user.exists() || !system.exists() => user,
            _ => system.to_path_buf(),
        }
    }

    /// Load configuration, falling back to defaults if the file is missing
    pub async fn load(&self) -> NodebootResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> NodebootResult<Config> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            NodebootError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| NodebootError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> NodebootResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                NodebootError::io(format!("creating config directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            NodebootError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
