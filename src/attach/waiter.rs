//! Assignment Waiter
//!
//! Polls the cluster manager for assignment confirmation of a resource on a
//! node. Not being assigned within the budget is an answer, not an error.

use crate::domain::ports::{ClusterManager, Resource, RetryPolicy};
use crate::error::Result;
use tracing::debug;

/// Wait until `resource` is reported assigned to its node.
///
/// Queries right away, then sleeps `policy.interval` before each further
/// query. Returns `Ok(false)` once `policy.max_attempts` polls all came back
/// unassigned, without a trailing sleep. Manager errors propagate immediately.
pub async fn wait_for_assignment<C>(
    client: &C,
    resource: &Resource,
    policy: RetryPolicy,
) -> Result<bool>
where
    C: ClusterManager + ?Sized,
{
    for attempt in 1..=policy.max_attempts {
        if client.query_assigned(resource).await? {
            debug!("{} assigned (attempt {})", resource, attempt);
            return Ok(true);
        }

        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    debug!(
        "{} still unassigned after {} attempts",
        resource, policy.max_attempts
    );
    Ok(false)
}
