//! In-memory fakes of the domain ports for unit tests

use crate::domain::ports::{ClusterManager, MountEntry, Mounter, Resource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};

// =============================================================================
// Fake Cluster Manager
// =============================================================================

#[derive(Default)]
pub struct FakeClusterManager {
    assigned: Mutex<HashSet<(String, String)>>,
    device_after: Option<(u32, String)>,
    fail_queries: bool,
    fail_assigned_queries: bool,
    reject_assign: bool,
    device_queries: AtomicU32,
    assigned_queries: AtomicU32,
    assign_calls: AtomicU32,
    unassign_calls: AtomicU32,
}

impl FakeClusterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `path` from the `n`th device query onwards
    pub fn with_device_after(mut self, n: u32, path: &str) -> Self {
        self.device_after = Some((n, path.to_string()));
        self
    }

    pub fn with_assigned(self, resource: &Resource) -> Self {
        self.assigned
            .lock()
            .insert((resource.name.clone(), resource.node_name.clone()));
        self
    }

    pub fn failing_queries(mut self) -> Self {
        self.fail_queries = true;
        self
    }

    /// Fail only assignment queries, leaving device queries working
    pub fn failing_assigned_queries(mut self) -> Self {
        self.fail_assigned_queries = true;
        self
    }

    pub fn rejecting_assign(mut self) -> Self {
        self.reject_assign = true;
        self
    }

    pub fn is_assigned(&self, resource: &Resource) -> bool {
        self.assigned
            .lock()
            .contains(&(resource.name.clone(), resource.node_name.clone()))
    }

    pub fn device_queries(&self) -> u32 {
        self.device_queries.load(Ordering::SeqCst)
    }

    pub fn assigned_queries(&self) -> u32 {
        self.assigned_queries.load(Ordering::SeqCst)
    }

    pub fn assign_calls(&self) -> u32 {
        self.assign_calls.load(Ordering::SeqCst)
    }

    pub fn unassign_calls(&self) -> u32 {
        self.unassign_calls.load(Ordering::SeqCst)
    }

    /// Total number of calls of any kind
    pub fn total_calls(&self) -> u32 {
        self.device_queries() + self.assigned_queries() + self.assign_calls() + self.unassign_calls()
    }

    fn query_failure(&self, command: &str) -> Error {
        Error::ManagerCommand {
            command: command.to_string(),
            reason: "connection to drbdmanaged refused".to_string(),
        }
    }
}

#[async_trait]
impl ClusterManager for FakeClusterManager {
    async fn assign(&self, resource: &Resource) -> Result<()> {
        self.assign_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_assign {
            return Err(Error::Assignment {
                resource: resource.name.clone(),
                node: resource.node_name.clone(),
                reason: "node unreachable".to_string(),
            });
        }
        self.assigned
            .lock()
            .insert((resource.name.clone(), resource.node_name.clone()));
        Ok(())
    }

    async fn unassign(&self, resource: &Resource) -> Result<()> {
        self.unassign_calls.fetch_add(1, Ordering::SeqCst);
        self.assigned
            .lock()
            .remove(&(resource.name.clone(), resource.node_name.clone()));
        Ok(())
    }

    async fn query_device_path(&self, _resource: &Resource) -> Result<Option<String>> {
        let n = self.device_queries.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_queries {
            return Err(self.query_failure("drbdmanage list-volumes"));
        }
        Ok(match &self.device_after {
            Some((after, path)) if n >= *after => Some(path.clone()),
            _ => None,
        })
    }

    async fn query_assigned(&self, resource: &Resource) -> Result<bool> {
        self.assigned_queries.fetch_add(1, Ordering::SeqCst);
        if self.fail_queries || self.fail_assigned_queries {
            return Err(self.query_failure("drbdmanage list-assignments"));
        }
        Ok(self.is_assigned(resource))
    }
}

// =============================================================================
// Fake Mounter
// =============================================================================

#[derive(Default)]
pub struct FakeMounter {
    table: Mutex<HashMap<String, MountEntry>>,
    signatures: Mutex<HashMap<String, String>>,
    busy: bool,
    mount_calls: AtomicU32,
    unmount_calls: AtomicU32,
    format_calls: AtomicU32,
}

impl FakeMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend `device` already carries a `fs_type` filesystem
    pub fn with_filesystem(self, device: &str, fs_type: &str) -> Self {
        self.signatures
            .lock()
            .insert(device.to_string(), fs_type.to_string());
        self
    }

    pub fn with_mount(self, device: &str, target: &str, fs_type: &str) -> Self {
        self.table.lock().insert(
            target.to_string(),
            MountEntry {
                source: device.to_string(),
                target: target.to_string(),
                fs_type: fs_type.to_string(),
            },
        );
        self
    }

    /// Make unmount fail as if the device were in use
    pub fn busy(mut self) -> Self {
        self.busy = true;
        self
    }

    pub fn mounts(&self) -> Vec<MountEntry> {
        self.table.lock().values().cloned().collect()
    }

    pub fn mount_calls(&self) -> u32 {
        self.mount_calls.load(Ordering::SeqCst)
    }

    pub fn unmount_calls(&self) -> u32 {
        self.unmount_calls.load(Ordering::SeqCst)
    }

    pub fn format_calls(&self) -> u32 {
        self.format_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Mounter for FakeMounter {
    async fn mount_entry(&self, target: &str) -> Result<Option<MountEntry>> {
        Ok(self.table.lock().get(target).cloned())
    }

    async fn detect_fs_type(&self, device: &str) -> Result<Option<String>> {
        Ok(self.signatures.lock().get(device).cloned())
    }

    async fn format(&self, device: &str, fs_type: &str) -> Result<()> {
        self.format_calls.fetch_add(1, Ordering::SeqCst);
        self.signatures
            .lock()
            .insert(device.to_string(), fs_type.to_string());
        Ok(())
    }

    async fn mount(&self, device: &str, target: &str, fs_type: &str) -> Result<()> {
        self.mount_calls.fetch_add(1, Ordering::SeqCst);
        self.table.lock().insert(
            target.to_string(),
            MountEntry {
                source: device.to_string(),
                target: target.to_string(),
                fs_type: fs_type.to_string(),
            },
        );
        Ok(())
    }

    async fn unmount(&self, target: &str) -> Result<()> {
        self.unmount_calls.fetch_add(1, Ordering::SeqCst);
        if self.busy {
            return Err(Error::Unmount {
                target: target.to_string(),
                reason: "target is busy".to_string(),
            });
        }
        self.table.lock().remove(target);
        Ok(())
    }
}
