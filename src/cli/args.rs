//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// nodeboot - Node bootstrap and cloud identity resolution
///
/// Installs the node agent at instance boot and maps Kubernetes nodes back
/// to their EC2 instances.
#[derive(Parser, Debug)]
#[command(name = "nodeboot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "NODEBOOT_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download, verify and start the node agent
    Bootstrap(BootstrapArgs),

    /// Download a single file with checksum verification
    Fetch(FetchArgs),

    /// Resolve a node's EC2 identity and labels
    Identify(IdentifyArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the bootstrap command
#[derive(Parser, Debug)]
pub struct BootstrapArgs {
    /// Architecture to install for (defaults to this host's)
    #[arg(long)]
    pub arch: Option<String>,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Where to write the file
    #[arg(long)]
    pub dest: PathBuf,

    /// Expected lowercase hex SHA-256
    #[arg(long)]
    pub hash: String,

    /// Mirror URLs, tried in order
    #[arg(required = true)]
    pub urls: Vec<String>,
}

/// Arguments for the identify command
#[derive(Parser, Debug)]
pub struct IdentifyArgs {
    /// Provider id, e.g. aws:///us-east-1a/i-0123456789abcdef0
    pub provider_id: String,

    /// Node name, used in error messages
    #[arg(long)]
    pub node: Option<String>,

    /// Bypass the identity cache
    #[arg(long)]
    pub no_cache: bool,

    /// AWS region (overrides config and instance metadata)
    #[arg(long)]
    pub region: Option<String>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn fetch_collects_mirrors_in_order() {
        let cli = Cli::parse_from([
            "nodeboot", "fetch", "--dest", "/tmp/nodeup", "--hash", "ab", "https://a", "https://b",
        ]);
        match cli.command {
            Commands::Fetch(args) => assert_eq!(args.urls, ["https://a", "https://b"]),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn identify_flags() {
        let cli = Cli::parse_from([
            "nodeboot", "-vv", "identify", "aws:///z/i-1", "--no-cache", "--node", "n1",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Identify(args) => {
                assert!(args.no_cache);
                assert_eq!(args.node.as_deref(), Some("n1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
