//! Configuration schema for nodeboot
//!
//! Configuration is stored at `~/.config/nodeboot/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Node bootstrap settings
    pub bootstrap: BootstrapConfig,

    /// Node identity resolution settings
    pub identity: IdentityConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Node bootstrap settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Directory the agent binary is installed into
    pub install_dir: PathBuf,

    /// Configuration file handed to the agent
    pub agent_config: PathBuf,

    /// Pause between full passes over all mirrors
    pub retry_interval_secs: u64,

    /// Connect timeout for a single transfer
    pub connect_timeout_secs: u64,

    /// Retries inside a single transfer attempt
    pub transfer_retries: u32,

    /// Delay between retries inside a transfer attempt
    pub retry_delay_secs: u64,

    /// Artifact per architecture, keyed by "amd64" / "arm64"
    pub artifacts: BTreeMap<String, ArtifactSource>,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            install_dir: PathBuf::from("/opt/kops/bin"),
            agent_config: PathBuf::from("/opt/kops/conf/kube_env.yaml"),
            retry_interval_secs: 60,
            connect_timeout_secs: 20,
            transfer_retries: 6,
            retry_delay_secs: 10,
            artifacts: BTreeMap::new(),
        }
    }
}

/// Where to download one architecture's agent from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactSource {
    /// Mirror URLs, tried in order
    pub urls: Vec<String>,

    /// Lowercase hex SHA-256 of the artifact
    pub hash: String,

    /// File name inside `install_dir`
    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_file_name() -> String {
    "nodeup".to_string()
}

/// Node identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Cache resolved identities
    pub cache_enabled: bool,

    /// Lifetime of a cached identity
    pub cache_ttl_secs: u64,

    /// AWS region (queried from instance metadata when unset)
    pub region: Option<String>,

    /// AWS profile to use
    pub profile: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_secs: 60 * 60,
            region: None,
            profile: None,
        }
    }
}
