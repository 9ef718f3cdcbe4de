//! Driver configuration
//!
//! FlexVolume drivers receive no configuration from the kubelet beyond their
//! positional arguments, so tunables come from flags or the environment and
//! are folded into a [`PluginConfig`].

use crate::domain::ports::RetryPolicy;
use crate::error::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the driver
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// drbdmanage executable
    pub drbdmanage_bin: String,
    /// Directory holding DRBD device nodes
    pub dev_dir: PathBuf,
    /// Polling policy for assignment and device path queries
    pub poll: RetryPolicy,
    /// Assign resources as diskless clients
    pub client_assign: bool,
    /// Filesystem created on blank devices when none is requested
    pub default_fs_type: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            drbdmanage_bin: "drbdmanage".to_string(),
            dev_dir: PathBuf::from("/dev"),
            poll: RetryPolicy::default(),
            client_assign: false,
            default_fs_type: "ext4".to_string(),
        }
    }
}

impl PluginConfig {
    /// Build a poll policy, rejecting a zero attempt budget
    pub fn with_poll(mut self, attempts: u32, interval_ms: u64) -> Result<Self> {
        if attempts == 0 {
            return Err(Error::Configuration(
                "poll attempts must be at least 1".to_string(),
            ));
        }
        self.poll = RetryPolicy::new(attempts, Duration::from_millis(interval_ms));
        Ok(self)
    }
}
