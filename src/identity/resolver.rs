//! Map a node's provider id to its EC2 identity
//!
//! Lookup order per call:
//!
//! ```text
//! parse id ─► cache hit? ─► describe instance ─► running? ─► labels ─► cache put
//!   │            └─ yes: return cached                │
//!   └─ invalid: fail, no AWS call                     └─ not found / ambiguous / wrong state: fail
//! ```
//!
//! Failures are returned to the caller, who decides whether to retry.

use crate::config::schema::IdentityConfig;
use crate::error::{NodebootError, NodebootResult};
use crate::identity::cache::IdentityCache;
use crate::identity::ec2::{metadata_region, AwsCliEc2, Ec2Api, Instance};
use crate::identity::provider_id::parse_provider_id;
use crate::identity::Info;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cloud tag carrying the instance group name
pub const CLOUD_TAG_INSTANCE_GROUP: &str = "kops.k8s.io/instancegroup";

/// Tag prefix the cluster autoscaler uses for node template labels
pub const NODE_TEMPLATE_LABEL_PREFIX: &str = "k8s.io/cluster-autoscaler/node-template/label/";

const STATE_RUNNING: &str = "running";

/// A node to identify
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub name: String,
    pub provider_id: String,
}

/// Resolves nodes against EC2, fronted by an [`IdentityCache`]
pub struct CloudInstanceResolver {
    ec2: Arc<dyn Ec2Api>,
    cache: IdentityCache,
    cache_enabled: bool,
}

impl CloudInstanceResolver {
    pub fn new(ec2: Arc<dyn Ec2Api>, cache: IdentityCache, cache_enabled: bool) -> Self {
        Self {
            ec2,
            cache,
            cache_enabled,
        }
    }

    /// Resolver using the AWS CLI, with the region from config or instance metadata
    pub async fn from_config(config: &IdentityConfig) -> NodebootResult<Self> {
        let region = match &config.region {
            Some(region) => region.clone(),
            None => metadata_region().await?,
        };
        debug!("Using AWS region {}", region);

        Ok(Self::new(
            Arc::new(AwsCliEc2::new(Some(region), config.profile.clone())),
            IdentityCache::new(Duration::from_secs(config.cache_ttl_secs)),
            config.cache_enabled,
        ))
    }

    pub fn cache(&self) -> &IdentityCache {
        &self.cache
    }

    /// Identify the instance behind `provider_id`
    pub async fn identify(&self, provider_id: &str, caching_enabled: bool) -> NodebootResult<Info> {
        let instance_id = parse_provider_id(provider_id)?;
        self.resolve(instance_id, caching_enabled).await
    }

    /// Identify a named node using the resolver's caching setting
    pub async fn identify_node(&self, node_name: &str, provider_id: &str) -> NodebootResult<Info> {
        if provider_id.is_empty() {
            return Err(NodebootError::ProviderIdMissing(node_name.to_string()));
        }
        let instance_id = parse_provider_id(provider_id).map_err(|_| {
            NodebootError::InvalidProviderId {
                provider_id: provider_id.to_string(),
                node: Some(node_name.to_string()),
            }
        })?;
        self.resolve(instance_id, self.cache_enabled).await
    }

    /// Identify many nodes concurrently; results keep the input order
    pub async fn identify_all(&self, nodes: &[NodeRef]) -> Vec<NodebootResult<Info>> {
        join_all(
            nodes
                .iter()
                .map(|node| self.identify_node(&node.name, &node.provider_id)),
        )
        .await
    }

    async fn resolve(&self, instance_id: &str, caching_enabled: bool) -> NodebootResult<Info> {
        if caching_enabled {
            match self.cache.get(instance_id) {
                Ok(Some(info)) => {
                    debug!("Node identity of {} served from cache", instance_id);
                    return Ok(info);
                }
                Ok(None) => {}
                Err(e) => warn!("Node identity cache lookup failure: {}", e),
            }
        }

        let instance = self.describe_one(instance_id).await?;

        let state = instance.state_name().unwrap_or("?");
        if state != STATE_RUNNING {
            return Err(NodebootError::InstanceNotRunning {
                instance_id: instance_id.to_string(),
                state: state.to_string(),
            });
        }

        let info = derive_info(instance_id, &instance);

        if caching_enabled {
            if let Err(e) = self.cache.put(info.clone()) {
                warn!("Failed to add node identity info to cache: {}", e);
            }
        }

        Ok(info)
    }

    async fn describe_one(&self, instance_id: &str) -> NodebootResult<Instance> {
        let mut instances = self.ec2.describe_instances(instance_id).await?;
        match instances.len() {
            0 => Err(NodebootError::InstanceNotFound(instance_id.to_string())),
            1 => Ok(instances.remove(0)),
            _ => Err(NodebootError::AmbiguousInstance(instance_id.to_string())),
        }
    }
}

/// Build the identity of a running instance.
///
/// Tags are applied in key order, after the lifecycle label, so the result
/// does not depend on the order EC2 returns them in.
pub fn derive_info(instance_id: &str, instance: &Instance) -> Info {
    let mut labels = BTreeMap::new();

    if let Some(lifecycle) = instance
        .instance_lifecycle
        .as_deref()
        .filter(|l| !l.is_empty())
    {
        labels.insert(
            format!("node-role.kubernetes.io/{}-worker", lifecycle),
            "true".to_string(),
        );
    }

    let mut tags: Vec<_> = instance.tags.iter().collect();
    tags.sort_by(|a, b| a.key.cmp(&b.key));

    let mut instance_group = None;
    for tag in tags {
        if tag.key == CLOUD_TAG_INSTANCE_GROUP {
            instance_group = Some(tag.value.clone());
        }
        if let Some(label) = tag.key.strip_prefix(NODE_TEMPLATE_LABEL_PREFIX) {
            labels.insert(label.to_string(), tag.value.clone());
        }
    }

    Info {
        instance_id: instance_id.to_string(),
        instance_group,
        labels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::clock::ManualClock;
    use crate::identity::ec2::{InstanceState, Tag};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const PROVIDER_ID: &str = "aws:///us-east-1a/i-0abc";

    #[derive(Default)]
    struct MockEc2 {
        instances: Mutex<HashMap<String, Vec<Instance>>>,
        calls: AtomicUsize,
    }

    impl MockEc2 {
        fn with(instance_id: &str, instances: Vec<Instance>) -> Arc<Self> {
            let mock = Self::default();
            mock.instances
                .lock()
                .unwrap()
                .insert(instance_id.to_string(), instances);
            Arc::new(mock)
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Ec2Api for MockEc2 {
        async fn describe_instances(&self, instance_id: &str) -> NodebootResult<Vec<Instance>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .instances
                .lock()
                .unwrap()
                .get(instance_id)
                .cloned()
                .unwrap_or_default())
        }
    }

    fn instance(state: &str, lifecycle: Option<&str>, tags: &[(&str, &str)]) -> Instance {
        Instance {
            instance_id: Some("i-0abc".to_string()),
            state: Some(InstanceState {
                name: Some(state.to_string()),
            }),
            instance_lifecycle: lifecycle.map(str::to_string),
            tags: tags
                .iter()
                .map(|(k, v)| Tag {
                    key: k.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    fn resolver(ec2: Arc<MockEc2>) -> (CloudInstanceResolver, ManualClock) {
        let clock = ManualClock::new();
        let cache = IdentityCache::with_clock(Duration::from_secs(3600), Arc::new(clock.clone()));
        (CloudInstanceResolver::new(ec2, cache, true), clock)
    }

    #[tokio::test]
    async fn malformed_provider_id_makes_no_cloud_call() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("running", None, &[])]);
        let (resolver, _) = resolver(ec2.clone());

        for bad in ["", "gce:///zone/i-0abc", "aws:///i-0abc", "aws:///a/b/i-0abc"] {
            let err = resolver.identify(bad, true).await.unwrap_err();
            assert!(matches!(err, NodebootError::InvalidProviderId { .. }));
        }
        assert_eq!(ec2.calls(), 0);
    }

    #[tokio::test]
    async fn missing_instance_is_not_found() {
        let ec2 = MockEc2::with("i-0abc", vec![]);
        let (resolver, _) = resolver(ec2);

        let err = resolver.identify(PROVIDER_ID, true).await.unwrap_err();
        assert!(matches!(err, NodebootError::InstanceNotFound(ref id) if id == "i-0abc"));
        assert!(err.to_string().contains("missing instance id"));
    }

    #[tokio::test]
    async fn duplicate_instances_are_ambiguous() {
        let ec2 = MockEc2::with(
            "i-0abc",
            vec![
                instance("running", None, &[(CLOUD_TAG_INSTANCE_GROUP, "a")]),
                instance("running", None, &[(CLOUD_TAG_INSTANCE_GROUP, "b")]),
            ],
        );
        let (resolver, _) = resolver(ec2);

        let err = resolver.identify(PROVIDER_ID, true).await.unwrap_err();
        assert!(matches!(err, NodebootError::AmbiguousInstance(_)));
        assert!(resolver.cache().get("i-0abc").unwrap().is_none());
    }

    #[tokio::test]
    async fn instance_must_be_running() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("stopped", None, &[])]);
        let (resolver, _) = resolver(ec2);

        let err = resolver.identify(PROVIDER_ID, true).await.unwrap_err();
        assert!(matches!(
            err,
            NodebootError::InstanceNotRunning { ref state, .. } if state == "stopped"
        ));
    }

    #[tokio::test]
    async fn missing_state_is_reported_as_unknown() {
        let mut stateless = instance("running", None, &[]);
        stateless.state = None;
        let (resolver, _) = resolver(MockEc2::with("i-0abc", vec![stateless]));

        let err = resolver.identify(PROVIDER_ID, false).await.unwrap_err();
        assert!(matches!(err, NodebootError::InstanceNotRunning { ref state, .. } if state == "?"));
    }

    #[tokio::test]
    async fn running_instance_yields_labels() {
        let ec2 = MockEc2::with(
            "i-0abc",
            vec![instance(
                "running",
                Some("spot"),
                &[
                    ("k8s.io/cluster-autoscaler/node-template/label/foo", "bar"),
                    ("kops.k8s.io/instancegroup", "nodes-us-east-1a"),
                    ("Name", "nodes.example.com"),
                ],
            )],
        );
        let (resolver, _) = resolver(ec2);

        let info = resolver.identify(PROVIDER_ID, true).await.unwrap();
        assert_eq!(info.instance_id, "i-0abc");
        assert_eq!(info.instance_group.as_deref(), Some("nodes-us-east-1a"));
        assert_eq!(
            info.labels,
            BTreeMap::from([
                ("foo".to_string(), "bar".to_string()),
                ("node-role.kubernetes.io/spot-worker".to_string(), "true".to_string()),
            ])
        );
    }

    #[test]
    fn tag_labels_are_order_independent() {
        let forward = instance(
            "running",
            Some("spot"),
            &[
                (
                    "k8s.io/cluster-autoscaler/node-template/label/node-role.kubernetes.io/spot-worker",
                    "false",
                ),
                ("k8s.io/cluster-autoscaler/node-template/label/zone", "a"),
            ],
        );
        let mut reversed = forward.clone();
        reversed.tags.reverse();

        let a = derive_info("i-0abc", &forward);
        let b = derive_info("i-0abc", &reversed);
        assert_eq!(a, b);
        // Explicit template labels win over the synthesized lifecycle label
        assert_eq!(a.labels["node-role.kubernetes.io/spot-worker"], "false");
    }

    #[tokio::test]
    async fn cache_bounds_cloud_calls_within_ttl() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("running", None, &[])]);
        let (resolver, clock) = resolver(ec2.clone());

        let first = resolver.identify(PROVIDER_ID, true).await.unwrap();
        let second = resolver.identify(PROVIDER_ID, true).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ec2.calls(), 1);

        clock.advance(Duration::from_secs(3601));
        resolver.identify(PROVIDER_ID, true).await.unwrap();
        assert_eq!(ec2.calls(), 2);
    }

    #[tokio::test]
    async fn caching_disabled_always_asks_ec2() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("running", None, &[])]);
        let (resolver, _) = resolver(ec2.clone());

        resolver.identify(PROVIDER_ID, false).await.unwrap();
        resolver.identify(PROVIDER_ID, false).await.unwrap();
        assert_eq!(ec2.calls(), 2);
        assert!(resolver.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn identify_node_names_the_node() {
        let (resolver, _) = resolver(MockEc2::with("i-0abc", vec![]));

        let err = resolver.identify_node("node-a", "").await.unwrap_err();
        assert_eq!(err.to_string(), "providerID was not set for node node-a");

        let err = resolver.identify_node("node-a", "aws://i-0abc").await.unwrap_err();
        assert!(err.to_string().ends_with("not recognized for node node-a"));
    }

    #[tokio::test]
    async fn identify_all_keeps_order() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("running", None, &[])]);
        let (resolver, _) = resolver(ec2.clone());

        let nodes = vec![
            NodeRef {
                name: "good".to_string(),
                provider_id: PROVIDER_ID.to_string(),
            },
            NodeRef {
                name: "bad".to_string(),
                provider_id: "bogus".to_string(),
            },
            NodeRef {
                name: "gone".to_string(),
                provider_id: "aws:///us-east-1a/i-gone".to_string(),
            },
        ];

        let results = resolver.identify_all(&nodes).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().instance_id, "i-0abc");
        assert!(matches!(results[1], Err(NodebootError::InvalidProviderId { .. })));
        assert!(matches!(results[2], Err(NodebootError::InstanceNotFound(_))));
    }

    #[tokio::test]
    async fn concurrent_identify_shares_one_cache() {
        let ec2 = MockEc2::with("i-0abc", vec![instance("running", None, &[])]);
        let (resolver, _) = resolver(ec2.clone());
        let resolver = Arc::new(resolver);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move { resolver.identify(PROVIDER_ID, true).await })
            })
            .collect();
        for task in join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap().instance_id, "i-0abc");
        }

        assert!(ec2.calls() >= 1);
        assert_eq!(resolver.cache().len().unwrap(), 1);

        resolver.identify(PROVIDER_ID, true).await.unwrap();
        let settled = ec2.calls();
        resolver.identify(PROVIDER_ID, true).await.unwrap();
        assert_eq!(ec2.calls(), settled);
    }
}
