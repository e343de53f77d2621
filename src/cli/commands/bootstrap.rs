//! Bootstrap command - install and start the node agent

use crate::bootstrap::{Architecture, ArtifactFetcher, Bootstrap, FetchOutcome};
use crate::cli::args::BootstrapArgs;
use crate::cli::commands::interrupt_signal;
use crate::config::Config;
use crate::error::{NodebootError, NodebootResult};
use console::style;

/// Execute the bootstrap command
pub async fn execute(args: BootstrapArgs, config: &Config) -> NodebootResult<()> {
    let architecture = match args.arch.as_deref() {
        Some(arch) => Architecture::from_machine(arch)?,
        None => Architecture::detect()?,
    };

    let fetcher =
        ArtifactFetcher::from_config(&config.bootstrap).with_cancellation(interrupt_signal());
    let bootstrap = Bootstrap::from_config(&config.bootstrap)?.with_fetcher(fetcher);

    let report = bootstrap.run_for(architecture).await?;

    match (&report.outcome, report.agent_pid) {
        (FetchOutcome::Cancelled, _) => Err(NodebootError::User(
            "Bootstrap interrupted before the agent was installed".to_string(),
        )),
        (_, Some(pid)) => {
            println!(
                "{} {} agent {} started (pid {})",
                style("✓").green(),
                report.architecture,
                report.artifact.display(),
                pid
            );
            Ok(())
        }
        (_, None) => Err(NodebootError::Internal("agent was not started".to_string())),
    }
}
