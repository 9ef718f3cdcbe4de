//! DRBD FlexVolume Driver
//!
//! A Kubernetes FlexVolume driver that attaches DRBD resources managed by
//! drbdmanage to nodes and mounts the resulting block devices.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │              kubelet: <driver> <action> [args...]            │
//! ├──────────────────────────────────────────────────────────────┤
//! │                   Action Dispatcher (api)                    │
//! ├──────────────────────────────┬───────────────────────────────┤
//! │   Attachment polling         │     Mount Controller          │
//! │   (device path, assignment)  │     (idempotent mount/umount) │
//! ├──────────────────────────────┼───────────────────────────────┤
//! │   ClusterManager port        │     Mounter port              │
//! │   └─ drbdmanage CLI          │     └─ mountinfo + util-linux │
//! └──────────────────────────────┴───────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`api`]: exec protocol, options and response envelope
//! - [`attach`]: bounded polling for device paths and assignments
//! - [`mount`]: mount controller and host mounter
//! - [`manager`]: cluster manager adapters
//! - [`domain`]: core types and ports
//! - [`config`]: driver configuration
//! - [`error`]: error types

pub mod api;
pub mod attach;
pub mod config;
pub mod domain;
pub mod error;
pub mod manager;
pub mod mount;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use api::{DriverAction, DriverOptions, ExitCode, FlexVolumeApi, Payload, Reply, Response};
pub use attach::{wait_for_assignment, wait_for_device_path};
pub use config::PluginConfig;
pub use domain::ports::{
    ClusterManager, MountEntry, MountRequest, Mounter, Resource, RetryPolicy,
};
pub use error::{Error, Result};
pub use manager::DrbdManageClient;
pub use mount::{MountController, SystemMounter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
