//! Integrity-verified, indefinitely retried artifact download
//!
//! At boot nothing can act on a "download failed" result, so the fetcher
//! keeps cycling through every mirror and transport until the file on disk
//! hashes to the expected digest. The only way out without the file is an
//! explicit cancellation signal.

use crate::bootstrap::transport::{default_transports, TransferPolicy, Transport};
use crate::config::schema::BootstrapConfig;
use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Result of a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Destination already held the expected bytes
    AlreadyPresent,
    /// Downloaded and verified
    Downloaded {
        url: String,
        transport: &'static str,
        attempts: u32,
    },
    /// Cancellation was signalled before a verified download
    Cancelled,
}

/// Downloads a file from a list of mirrors until its checksum matches
pub struct ArtifactFetcher {
    transports: Vec<Box<dyn Transport>>,
    retry_interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl ArtifactFetcher {
    /// Pause between full passes over all mirrors
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(60);

    pub fn new(transports: Vec<Box<dyn Transport>>) -> Self {
        Self {
            transports,
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
            cancel: None,
        }
    }

    /// Fetcher using curl then the built-in HTTP client
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(default_transports(TransferPolicy::from_config(config)))
            .with_retry_interval(Duration::from_secs(config.retry_interval_secs))
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    /// Stop retrying once the watched value becomes `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Ensure `dest` holds a file whose SHA-256 is `expected_sha256`.
    ///
    /// Returns only once the file is verified, or when cancelled. Failed
    /// transfers and checksum mismatches are logged and retried.
    pub async fn fetch(
        &self,
        dest: &Path,
        expected_sha256: &str,
        mirror_urls: &[String],
    ) -> FetchOutcome {
        match file_sha256(dest).await {
            Ok(Some(actual)) if actual == expected_sha256 => {
                info!("{} already present with expected hash", dest.display());
                return FetchOutcome::AlreadyPresent;
            }
            Ok(Some(actual)) => {
                warn!(
                    "{} has hash {}, expected {}; removing",
                    dest.display(),
                    actual,
                    expected_sha256
                );
                remove_file(dest).await;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Unable to hash existing {}: {}", dest.display(), e);
                remove_file(dest).await;
            }
        }

        if mirror_urls.is_empty() {
            warn!("No mirrors configured for {}", dest.display());
        }

        let mut attempts = 0u32;
        loop {
            for url in mirror_urls {
                for transport in &self.transports {
                    if self.is_cancelled() {
                        info!("Download of {} cancelled", dest.display());
                        return FetchOutcome::Cancelled;
                    }

                    attempts += 1;
                    debug!("Downloading {} via {}", url, transport.name());

                    if let Err(e) = transport.download(url, dest).await {
                        warn!("{}", e);
                        remove_file(dest).await;
                        continue;
                    }

                    match file_sha256(dest).await {
                        Ok(Some(actual)) if actual == expected_sha256 => {
                            info!("Downloaded {} from {}", dest.display(), url);
                            return FetchOutcome::Downloaded {
                                url: url.clone(),
                                transport: transport.name(),
                                attempts,
                            };
                        }
                        Ok(Some(actual)) => warn!(
                            "Hash mismatch for {}: got {}, expected {}",
                            url, actual, expected_sha256
                        ),
                        Ok(None) => {
                            warn!("{} reported success but wrote no file", transport.name())
                        }
                        Err(e) => warn!("Unable to hash {}: {}", dest.display(), e),
                    }
                    remove_file(dest).await;
                }
            }

            warn!(
                "All downloads failed; retrying in {}s",
                self.retry_interval.as_secs()
            );
            if !self.pause().await {
                info!("Download of {} cancelled", dest.display());
                return FetchOutcome::Cancelled;
            }
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Sleep between passes. Returns false when cancelled meanwhile.
    async fn pause(&self) -> bool {
        let Some(cancel) = &self.cancel else {
            tokio::time::sleep(self.retry_interval).await;
            return true;
        };

        let mut cancel = cancel.clone();
        if *cancel.borrow_and_update() {
            return false;
        }

        tokio::select! {
            _ = tokio::time::sleep(self.retry_interval) => true,
            changed = cancel.changed() => match changed {
                Ok(()) => !*cancel.borrow(),
                // Sender gone: nobody can cancel any more
                Err(_) => {
                    tokio::time::sleep(self.retry_interval).await;
                    true
                }
            },
        }
    }
}

/// Lowercase hex SHA-256 of a file, or `None` if it does not exist
pub async fn file_sha256(path: &Path) -> io::Result<Option<String>> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok(Some(hex::encode(hasher.finalize())))
    })
    .await
    .map_err(io::Error::other)?
}

async fn remove_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
