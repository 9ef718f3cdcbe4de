//! Domain Ports - Core trait definitions for the FlexVolume driver
//!
//! These traits define the boundaries between the attach/mount logic and the
//! external systems it drives: the drbdmanage cluster and the local mount
//! table. Adapters implement these traits to provide concrete functionality.

use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

// =============================================================================
// Resource Identity
// =============================================================================

/// A DRBD resource as known to the cluster manager, bound to the node an
/// action targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource name in the cluster manager's namespace
    pub name: String,
    /// Hostname of the node the resource is assigned to
    pub node_name: String,
}

impl Resource {
    pub fn new(name: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_name: node_name.into(),
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.node_name)
    }
}

// =============================================================================
// Mount Request
// =============================================================================

/// Everything the mount controller needs to stage a resource on this node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRequest {
    pub resource: Resource,
    /// Filesystem type; empty means use whatever is on the device
    pub fs_type: String,
    /// Requested access mode (`rw`/`ro`), advisory only
    pub read_write: String,
}

/// A single entry of the local mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub source: String,
    pub target: String,
    pub fs_type: String,
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded, fixed-interval polling policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Policy that polls without sleeping, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(4, Duration::from_secs(1))
    }
}

// =============================================================================
// Cluster Manager Port
// =============================================================================

/// Port for the external clustered storage manager
#[async_trait]
pub trait ClusterManager: Send + Sync {
    /// Request assignment of the resource to its node. No local retry.
    async fn assign(&self, resource: &Resource) -> Result<()>;

    /// Request removal of the assignment. Succeeds if nothing is assigned.
    async fn unassign(&self, resource: &Resource) -> Result<()>;

    /// Local block device path, `None` while it has not materialized yet
    async fn query_device_path(&self, resource: &Resource) -> Result<Option<String>>;

    /// Whether the manager currently reports the resource assigned to its node
    async fn query_assigned(&self, resource: &Resource) -> Result<bool>;
}

// =============================================================================
// Mounter Port
// =============================================================================

/// Port for local mount state and mount/format primitives
#[async_trait]
pub trait Mounter: Send + Sync {
    /// Mount table entry whose mount point is `target`, if any
    async fn mount_entry(&self, target: &str) -> Result<Option<MountEntry>>;

    /// Filesystem signature on the device, `None` if blank
    async fn detect_fs_type(&self, device: &str) -> Result<Option<String>>;

    /// Create a filesystem of `fs_type` on the device
    async fn format(&self, device: &str, fs_type: &str) -> Result<()>;

    /// Mount `device` at `target`
    async fn mount(&self, device: &str, target: &str, fs_type: &str) -> Result<()>;

    /// Unmount whatever is mounted at `target`
    async fn unmount(&self, target: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_display() {
        let res = Resource::new("r0", "nodeA");
        assert_eq!(res.to_string(), "r0@nodeA");
    }

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(RetryPolicy::immediate(3).interval, Duration::ZERO);
    }
}
