//! Device Path Resolver
//!
//! Polls the cluster manager until the local block device of a freshly
//! assigned resource materializes.

use crate::domain::ports::{ClusterManager, Resource, RetryPolicy};
use crate::error::{Error, Result};
use tracing::{debug, info};

/// Wait for the device path of `resource`.
///
/// The first query is issued immediately. After each miss the resolver sleeps
/// `policy.interval` and queries again, up to `policy.max_attempts` queries in
/// total, with no sleep after the last one. A manager error aborts
/// immediately; running out of attempts yields [`Error::Timeout`].
pub async fn wait_for_device_path<C>(
    client: &C,
    resource: &Resource,
    policy: RetryPolicy,
) -> Result<String>
where
    C: ClusterManager + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(path) = client.query_device_path(resource).await? {
            if !path.is_empty() {
                info!(
                    "Device path for {} is {} (attempt {})",
                    resource, path, attempt
                );
                return Ok(path);
            }
        }

        debug!(
            "Device path for {} not available (attempt {}/{})",
            resource, attempt, policy.max_attempts
        );

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(Error::Timeout {
        resource: resource.name.clone(),
        what: "device path".to_string(),
        attempts: policy.max_attempts,
    })
}
