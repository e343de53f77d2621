//! Node identity resolution
//!
//! Maps a Kubernetes node back to the EC2 instance behind it and derives the
//! labels automation applies to the node. Lookups are cached per resolver
//! for a bounded time; EC2 remains the source of truth.

pub mod cache;
pub mod clock;
pub mod ec2;
pub mod provider_id;
pub mod resolver;

pub use cache::{IdentityCache, DEFAULT_CACHE_TTL};
pub use clock::{Clock, ManualClock, SystemClock};
pub use ec2::{AwsCliEc2, Ec2Api, Instance};
pub use provider_id::parse_provider_id;
pub use resolver::{CloudInstanceResolver, NodeRef};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Resolved identity of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Info {
    pub instance_id: String,
    /// Instance group from the `kops.k8s.io/instancegroup` tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_group: Option<String>,
    pub labels: BTreeMap<String, String>,
}
