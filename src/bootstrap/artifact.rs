//! Per-architecture artifact descriptors
//!
//! The table is built once from `[bootstrap.artifacts.<arch>]` and never
//! mutated afterwards; selecting an entry is an exact-match lookup.

use crate::config::schema::BootstrapConfig;
use crate::error::{NodebootError, NodebootResult};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Host architectures an agent is published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Architecture {
    Amd64,
    Arm64,
}

impl Architecture {
    /// Detect the architecture this binary runs on
    pub fn detect() -> NodebootResult<Self> {
        Self::from_machine(std::env::consts::ARCH)
    }

    /// Map a machine name (`uname -m` or Go-style) to an architecture
    pub fn from_machine(machine: &str) -> NodebootResult<Self> {
        match machine {
            "x86_64" | "amd64" => Ok(Self::Amd64),
            "aarch64" | "arm64" => Ok(Self::Arm64),
            other => Err(NodebootError::UnsupportedArchitecture(other.to_string())),
        }
    }

    /// Name used in config keys and download paths
    pub fn name(&self) -> &'static str {
        match self {
            Self::Amd64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything needed to fetch and verify one agent binary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub architecture: Architecture,
    /// Mirrors in preference order
    pub mirror_urls: Vec<String>,
    /// Lowercase hex SHA-256
    pub expected_sha256: String,
    pub destination: PathBuf,
}

/// Immutable architecture → artifact mapping
#[derive(Debug, Clone, Default)]
pub struct ArtifactTable {
    specs: BTreeMap<Architecture, ArtifactSpec>,
}

impl ArtifactTable {
    /// Build the table from bootstrap configuration
    pub fn from_config(config: &BootstrapConfig) -> NodebootResult<Self> {
        let mut specs = BTreeMap::new();

        for (key, source) in &config.artifacts {
            let architecture = Architecture::from_machine(key)?;
            let destination = config.install_dir.join(&source.file_name);

            if source.urls.is_empty() {
                return Err(NodebootError::NoMirrors(destination));
            }
            validate_sha256(&source.hash).map_err(|reason| {
                NodebootError::User(format!("Invalid hash for {}: {}", architecture, reason))
            })?;

            specs.insert(
                architecture,
                ArtifactSpec {
                    architecture,
                    mirror_urls: source.urls.clone(),
                    expected_sha256: source.hash.clone(),
                    destination,
                },
            );
        }

        Ok(Self { specs })
    }

    /// Look up the artifact for an architecture
    pub fn select(&self, architecture: Architecture) -> NodebootResult<&ArtifactSpec> {
        self.specs
            .get(&architecture)
            .ok_or_else(|| NodebootError::ArtifactNotConfigured(architecture.to_string()))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Digests are compared as case-sensitive strings, so only lowercase is accepted.
pub(crate) fn validate_sha256(hash: &str) -> Result<(), String> {
    if hash.len() != 64 {
        return Err(format!("expected 64 hex characters, got {}", hash.len()));
    }
    if let Some(c) = hash
        .chars()
        .find(|c| !matches!(c, '0'..='9' | 'a'..='f'))
    {
        return Err(format!("unexpected character {:?}", c));
    }
    Ok(())
}
