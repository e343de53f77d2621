//! Identify command - resolve a node's EC2 identity

use crate::cli::args::IdentifyArgs;
use crate::config::Config;
use crate::error::{NodebootError, NodebootResult};
use crate::identity::{parse_provider_id, CloudInstanceResolver};

/// Execute the identify command
pub async fn execute(args: IdentifyArgs, config: &Config) -> NodebootResult<()> {
    // Validate before touching instance metadata or AWS
    if let Some(node) = &args.node {
        if args.provider_id.is_empty() {
            return Err(NodebootError::ProviderIdMissing(node.clone()));
        }
    }
    parse_provider_id(&args.provider_id).map_err(|_| NodebootError::InvalidProviderId {
        provider_id: args.provider_id.clone(),
        node: args.node.clone(),
    })?;

    let mut identity = config.identity.clone();
    if args.region.is_some() {
        identity.region = args.region.clone();
    }
    if args.no_cache {
        identity.cache_enabled = false;
    }

    let resolver = CloudInstanceResolver::from_config(&identity).await?;
    let info = match &args.node {
        Some(node) => resolver.identify_node(node, &args.provider_id).await?,
        None => {
            resolver
                .identify(&args.provider_id, identity.cache_enabled)
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
