//! Download transports
//!
//! Each transport performs one bounded transfer: a connect timeout plus a
//! small number of inner retries. Unbounded retrying belongs to the fetcher.

use crate::config::schema::BootstrapConfig;
use crate::error::{NodebootError, NodebootResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Limits applied to a single transfer attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    pub connect_timeout: Duration,
    pub retries: u32,
    pub retry_delay: Duration,
}

impl TransferPolicy {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            retries: config.transfer_retries,
            retry_delay: Duration::from_secs(config.retry_delay_secs),
        }
    }
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(20),
            retries: 6,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// A way of copying a URL to a local file
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `url` into `dest`, replacing any existing file
    async fn download(&self, url: &str, dest: &Path) -> NodebootResult<()>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// Transports in preference order: compressed curl first, then the built-in client
pub fn default_transports(policy: TransferPolicy) -> Vec<Box<dyn Transport>> {
    vec![
        Box::new(CurlTransport::new(policy)),
        Box::new(HttpTransport::new(policy)),
    ]
}

/// `curl` with transparent compression
pub struct CurlTransport {
    policy: TransferPolicy,
}

impl CurlTransport {
    pub fn new(policy: TransferPolicy) -> Self {
        Self { policy }
    }

    fn args(&self, url: &str, dest: &Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            "--compressed".to_string(),
            "-Lo".to_string(),
            dest.display().to_string(),
            "--connect-timeout".to_string(),
            self.policy.connect_timeout.as_secs().to_string(),
            "--retry".to_string(),
            self.policy.retries.to_string(),
            "--retry-delay".to_string(),
            self.policy.retry_delay.as_secs().to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Transport for CurlTransport {
    async fn download(&self, url: &str, dest: &Path) -> NodebootResult<()> {
        let args = self.args(url, dest);
        debug!("Executing: curl {:?}", args);

        let output = Command::new("curl")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| NodebootError::command_failed("curl", e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(NodebootError::Transfer {
                url: url.to_string(),
                transport: self.name().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn name(&self) -> &'static str {
        "curl"
    }
}

/// Built-in HTTP client, used when curl is missing or failing
pub struct HttpTransport {
    policy: TransferPolicy,
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new(policy: TransferPolicy) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(policy.connect_timeout))
            .build();
        Self {
            policy,
            agent: config.into(),
        }
    }

    async fn attempt(&self, url: &str, dest: &Path) -> Result<u64, String> {
        let agent = self.agent.clone();
        let url = url.to_string();
        let dest: PathBuf = dest.to_path_buf();

        tokio::task::spawn_blocking(move || copy_to_file(&agent, &url, &dest))
            .await
            .map_err(|e| format!("download task failed: {}", e))?
    }
}

fn copy_to_file(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<u64, String> {
    let response = agent.get(url).call().map_err(|e| e.to_string())?;
    let mut reader = response.into_body().into_reader();
    let mut file = std::fs::File::create(dest)
        .map_err(|e| format!("creating {}: {}", dest.display(), e))?;
    std::io::copy(&mut reader, &mut file).map_err(|e| e.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn download(&self, url: &str, dest: &Path) -> NodebootResult<()> {
        let mut last_error = String::new();

        for attempt in 0..=self.policy.retries {
            if attempt > 0 {
                tokio::time::sleep(self.policy.retry_delay).await;
            }

            match self.attempt(url, dest).await {
                Ok(bytes) => {
                    debug!("Downloaded {} bytes from {}", bytes, url);
                    return Ok(());
                }
                Err(e) => {
                    debug!("Attempt {} for {} failed: {}", attempt + 1, url, e);
                    last_error = e;
                }
            }
        }

        Err(NodebootError::Transfer {
            url: url.to_string(),
            transport: self.name().to_string(),
            reason: last_error,
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
