//! Node bootstrap
//!
//! Runs once at instance boot: selects the agent artifact for the host
//! architecture, downloads it with checksum verification (retrying for as
//! long as it takes), then starts it detached with the node configuration.
//!
//! | Failure | Handling |
//! |---------|----------|
//! | Unknown architecture | Fatal, reported immediately |
//! | Network error | Retried, next transport / mirror |
//! | Checksum mismatch | File deleted, next transport / mirror |
//! | Whole pass failed | Sleep, start the pass again |

pub mod artifact;
pub mod fetcher;
pub mod sequencer;
pub mod transport;

pub use artifact::{Architecture, ArtifactSpec, ArtifactTable};
pub use fetcher::{file_sha256, ArtifactFetcher, FetchOutcome};
pub use sequencer::{launch_agent, Bootstrap, BootstrapReport};
pub use transport::{default_transports, CurlTransport, HttpTransport, TransferPolicy, Transport};
