//! Boot-time sequence: pick the artifact, fetch it, hand off to it

use crate::bootstrap::artifact::{Architecture, ArtifactTable};
use crate::bootstrap::fetcher::{ArtifactFetcher, FetchOutcome};
use crate::config::schema::BootstrapConfig;
use crate::error::{NodebootError, NodebootResult};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::info;

/// What a bootstrap run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub architecture: Architecture,
    pub artifact: PathBuf,
    pub outcome: FetchOutcome,
    /// Pid of the detached agent, if one was started
    pub agent_pid: Option<u32>,
}

/// Installs the node agent and starts it
pub struct Bootstrap {
    table: ArtifactTable,
    fetcher: ArtifactFetcher,
    agent_config: PathBuf,
}

impl Bootstrap {
    pub fn new(table: ArtifactTable, fetcher: ArtifactFetcher, agent_config: PathBuf) -> Self {
        Self {
            table,
            fetcher,
            agent_config,
        }
    }

    pub fn from_config(config: &BootstrapConfig) -> NodebootResult<Self> {
        Ok(Self::new(
            ArtifactTable::from_config(config)?,
            ArtifactFetcher::from_config(config),
            config.agent_config.clone(),
        ))
    }

    /// Replace the fetcher, e.g. to attach a cancellation signal
    pub fn with_fetcher(mut self, fetcher: ArtifactFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Run for the architecture of this host
    pub async fn run(&self) -> NodebootResult<BootstrapReport> {
        let architecture = Architecture::detect()?;
        self.run_for(architecture).await
    }

    /// Run for an explicit architecture.
    ///
    /// Architecture errors fail immediately; download problems never
    /// surface here because the fetcher retries them.
    pub async fn run_for(&self, architecture: Architecture) -> NodebootResult<BootstrapReport> {
        let spec = self.table.select(architecture)?;
        info!("Bootstrapping {} agent into {}", architecture, spec.destination.display());

        if let Some(parent) = spec.destination.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                NodebootError::io(format!("creating directory {}", parent.display()), e)
            })?;
        }

        let outcome = self
            .fetcher
            .fetch(&spec.destination, &spec.expected_sha256, &spec.mirror_urls)
            .await;

        let agent_pid = match outcome {
            FetchOutcome::Cancelled => None,
            _ => Some(launch_agent(&spec.destination, &self.agent_config).await?),
        };

        Ok(BootstrapReport {
            architecture,
            artifact: spec.destination.clone(),
            outcome,
            agent_pid,
        })
    }
}

/// Make the agent executable and start it detached from this process.
///
/// The agent keeps running after bootstrap exits; nothing waits on it.
pub async fn launch_agent(agent: &Path, agent_config: &Path) -> NodebootResult<u32> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(agent, perms)
            .await
            .map_err(|e| NodebootError::io(format!("marking {} executable", agent.display()), e))?;
    }

    let mut cmd = Command::new(agent);
    cmd.arg("--install-systemd-unit")
        .arg(format!("--conf={}", agent_config.display()))
        .arg("--v=8")
        .stdin(Stdio::null());
    if let Some(dir) = agent.parent() {
        cmd.current_dir(dir);
    }
    #[cfg(unix)]
    cmd.process_group(0);

    let child = cmd.spawn().map_err(|e| NodebootError::AgentLaunch {
        path: agent.to_path_buf(),
        source: e,
    })?;
    let pid = child
        .id()
        .ok_or_else(|| NodebootError::Internal("agent exited before reporting a pid".to_string()))?;

    info!("Started {} (pid {})", agent.display(), pid);
    Ok(pid)
}
