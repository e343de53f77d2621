//! EC2 backend for instance lookups
//!
//! The production backend drives the AWS CLI, the same way the rest of the
//! tooling on a node talks to AWS. The region comes from configuration or,
//! failing that, from the instance metadata service.

use crate::error::{NodebootError, NodebootResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Base URL of the EC2 instance metadata service
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// The subset of an EC2 instance description that identity resolution reads
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Instance {
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub state: Option<InstanceState>,
    /// `spot` / `scheduled`; absent for on-demand capacity
    #[serde(default)]
    pub instance_lifecycle: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Instance {
    pub fn state_name(&self) -> Option<&str> {
        self.state.as_ref().and_then(|s| s.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceState {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Cloud-side instance lookup
#[async_trait]
pub trait Ec2Api: Send + Sync {
    /// All instances matching exactly `instance_id`
    async fn describe_instances(&self, instance_id: &str) -> NodebootResult<Vec<Instance>>;
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeInstancesOutput {
    #[serde(default)]
    reservations: Vec<Reservation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Instance>,
}

/// Flatten `aws ec2 describe-instances` JSON into its instances
pub fn parse_describe_output(json: &[u8]) -> NodebootResult<Vec<Instance>> {
    let output: DescribeInstancesOutput = serde_json::from_slice(json)
        .map_err(|e| NodebootError::Ec2Describe(format!("Failed to parse response: {}", e)))?;

    Ok(output
        .reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .collect())
}

/// [`Ec2Api`] backed by the AWS CLI
#[derive(Debug, Clone, Default)]
pub struct AwsCliEc2 {
    region: Option<String>,
    profile: Option<String>,
}

impl AwsCliEc2 {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self { region, profile }
    }

    fn args(&self, instance_id: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "ec2",
            "describe-instances",
            "--instance-ids",
            instance_id,
            "--output",
            "json",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        if let Some(region) = &self.region {
            args.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(profile) = &self.profile {
            args.extend(["--profile".to_string(), profile.clone()]);
        }
        args
    }
}

#[async_trait]
impl Ec2Api for AwsCliEc2 {
    async fn describe_instances(&self, instance_id: &str) -> NodebootResult<Vec<Instance>> {
        debug!("AWS API Request: ec2/DescribeInstances {}", instance_id);

        let output = Command::new("aws")
            .args(self.args(instance_id))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| NodebootError::command_failed("aws ec2 describe-instances", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // EC2 reports unknown ids as an error rather than an empty result
            if stderr.contains("InvalidInstanceID.NotFound") {
                return Ok(Vec::new());
            }
            return Err(NodebootError::Ec2Describe(stderr.trim().to_string()));
        }

        parse_describe_output(&output.stdout)
    }
}

/// Region of the instance we are running on, via IMDSv2
pub async fn metadata_region() -> NodebootResult<String> {
    metadata_region_from(IMDS_ENDPOINT).await
}

pub async fn metadata_region_from(endpoint: &str) -> NodebootResult<String> {
    let endpoint = endpoint.trim_end_matches('/').to_string();
    tokio::task::spawn_blocking(move || query_region(&endpoint))
        .await
        .map_err(|e| NodebootError::Internal(format!("metadata task failed: {}", e)))?
        .map_err(NodebootError::Metadata)
}

fn query_region(endpoint: &str) -> Result<String, String> {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(5)))
        .build()
        .into();

    let token_url = format!("{}/latest/api/token", endpoint);
    let mut response = agent
        .put(token_url.as_str())
        .header("X-aws-ec2-metadata-token-ttl-seconds", "60")
        .send_empty()
        .map_err(|e| e.to_string())?;
    let token = response
        .body_mut()
        .read_to_string()
        .map_err(|e| e.to_string())?;

    let region_url = format!("{}/latest/meta-data/placement/region", endpoint);
    let mut response = agent
        .get(region_url.as_str())
        .header("X-aws-ec2-metadata-token", token.trim())
        .call()
        .map_err(|e| e.to_string())?;
    let region = response
        .body_mut()
        .read_to_string()
        .map_err(|e| e.to_string())?;

    let region = region.trim();
    if region.is_empty() {
        return Err("empty region returned".to_string());
    }
    Ok(region.to_string())
}
