//! CLI command implementations

pub mod bootstrap;
pub mod config;
pub mod fetch;
pub mod identify;

pub use bootstrap::execute as bootstrap;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use identify::execute as identify;

use tokio::sync::watch;
use tracing::info;

/// Flips to `true` on Ctrl-C so long-running downloads can stop
pub(crate) fn interrupt_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            let _ = tx.send(true);
        }
    });
    rx
}
