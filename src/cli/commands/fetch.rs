//! Fetch command - verified download of a single file

use crate::bootstrap::artifact::validate_sha256;
use crate::bootstrap::{ArtifactFetcher, FetchOutcome};
use crate::cli::args::FetchArgs;
use crate::cli::commands::interrupt_signal;
use crate::config::Config;
use crate::error::{NodebootError, NodebootResult};
use console::style;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config) -> NodebootResult<()> {
    // A digest that can never match would otherwise retry forever
    validate_sha256(&args.hash)
        .map_err(|reason| NodebootError::User(format!("Invalid --hash: {}", reason)))?;

    let fetcher =
        ArtifactFetcher::from_config(&config.bootstrap).with_cancellation(interrupt_signal());

    match fetcher.fetch(&args.dest, &args.hash, &args.urls).await {
        FetchOutcome::AlreadyPresent => {
            println!(
                "{} {} already present",
                style("✓").green(),
                args.dest.display()
            );
            Ok(())
        }
        FetchOutcome::Downloaded {
            url,
            transport,
            attempts,
        } => {
            println!(
                "{} {} downloaded from {} via {} ({} attempts)",
                style("✓").green(),
                args.dest.display(),
                url,
                transport,
                attempts
            );
            Ok(())
        }
        FetchOutcome::Cancelled => Err(NodebootError::User(format!(
            "Download of {} interrupted",
            args.dest.display()
        ))),
    }
}
