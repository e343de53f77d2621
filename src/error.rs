//! Error types for nodeboot
//!
//! All modules use `NodebootResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for nodeboot operations
pub type NodebootResult<T> = Result<T, NodebootError>;

/// All errors that can occur in nodeboot
#[derive(Error, Debug)]
pub enum NodebootError {
    // Bootstrap errors
    #[error("Unsupported architecture: {0}")]
    UnsupportedArchitecture(String),

    #[error("No artifact configured for architecture {0}")]
    ArtifactNotConfigured(String),

    #[error("Artifact has no mirror URLs: {0}")]
    NoMirrors(PathBuf),

    #[error("Download of {url} via {transport} failed: {reason}")]
    Transfer {
        url: String,
        transport: String,
        reason: String,
    },

    #[error("Failed to start agent {path}: {source}")]
    AgentLaunch {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Identity errors
    #[error("providerID was not set for node {0}")]
    ProviderIdMissing(String),

    #[error("providerID {provider_id:?} not recognized{}", node_suffix(.node))]
    InvalidProviderId {
        provider_id: String,
        node: Option<String>,
    },

    #[error("missing instance id: {0}")]
    InstanceNotFound(String),

    #[error("found multiple instances with instance id: {0}")]
    AmbiguousInstance(String),

    #[error("found instance {instance_id:?}, but state is {state:?}")]
    InstanceNotRunning { instance_id: String, state: String },

    #[error("error from ec2 DescribeInstances request: {0}")]
    Ec2Describe(String),

    #[error("error querying ec2 metadata service (for region): {0}")]
    Metadata(String),

    #[error("Identity cache unavailable: {0}")]
    CacheUnavailable(String),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn node_suffix(node: &Option<String>) -> String {
    match node {
        Some(name) => format!(" for node {}", name),
        None => String::new(),
    }
}

impl NodebootError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a provider id error without node context
    pub fn invalid_provider_id(provider_id: impl Into<String>) -> Self {
        Self::InvalidProviderId {
            provider_id: provider_id.into(),
            node: None,
        }
    }

    /// Check if a caller may reasonably retry later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InstanceNotRunning { .. } | Self::Ec2Describe(_) | Self::Metadata(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::UnsupportedArchitecture(_) => Some("Supported architectures: amd64, arm64"),
            Self::ArtifactNotConfigured(_) => {
                Some("Add a [bootstrap.artifacts.<arch>] section with urls and hash")
            }
            Self::InvalidProviderId { .. } => Some("Expected format: aws:///<zone>/<instance-id>"),
            Self::Metadata(_) => Some("Set identity.region when not running on EC2"),
            Self::Ec2Describe(_) => Some("Check AWS credentials with: aws sts get-caller-identity"),
            _ => None,
        }
    }
}
