//! Provider id parsing
//!
//! Kubernetes sets `spec.providerID` on AWS nodes to
//! `aws:///<zone>/<instance-id>`: after the scheme there are exactly three
//! `/`-separated segments, the first of which is normally empty.

use crate::error::{NodebootError, NodebootResult};

/// Scheme prefix of AWS provider ids
pub const AWS_SCHEME: &str = "aws://";

/// Extract the instance id from an AWS provider id
pub fn parse_provider_id(provider_id: &str) -> NodebootResult<&str> {
    let rest = provider_id
        .strip_prefix(AWS_SCHEME)
        .ok_or_else(|| NodebootError::invalid_provider_id(provider_id))?;

    let tokens: Vec<&str> = rest.split('/').collect();
    match tokens.as_slice() {
        [_, _zone, instance_id] if !instance_id.is_empty() => Ok(*instance_id),
        _ => Err(NodebootError::invalid_provider_id(provider_id)),
    }
}
