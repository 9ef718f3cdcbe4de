//! Mount Controller
//!
//! Idempotent mount and unmount of resolved DRBD devices. All state is read
//! back from the [`Mounter`] port on every call, so re-running an action that
//! already took effect is a no-op.

use crate::domain::ports::Mounter;
use crate::error::{Error, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Mounts and unmounts devices through a [`Mounter`]
#[derive(Clone)]
pub struct MountController {
    mounter: Arc<dyn Mounter>,
    /// Filesystem created on blank devices when the request names none
    default_fs_type: String,
}

impl MountController {
    pub fn new(mounter: Arc<dyn Mounter>, default_fs_type: impl Into<String>) -> Self {
        Self {
            mounter,
            default_fs_type: default_fs_type.into(),
        }
    }

    /// Mount `device` at `target`.
    ///
    /// Succeeds without side effects if `target` is already mounted from
    /// `device`. A blank device is formatted first; a device holding a
    /// different filesystem than `fs_type` is refused.
    pub async fn mount(&self, device: &str, target: &str, fs_type: &str) -> Result<()> {
        if let Some(entry) = self.mounter.mount_entry(target).await? {
            if same_device(&entry.source, device) {
                debug!("{} already mounted at {}", device, target);
                return Ok(());
            }
            return Err(mount_error(
                device,
                target,
                format!("target already mounted from {}", entry.source),
            ));
        }

        tokio::fs::create_dir_all(target)
            .await
            .map_err(|e| mount_error(device, target, format!("creating target: {}", e)))?;

        let fs_type = self.select_fs_type(device, target, fs_type).await?;

        info!("Mounting {} at {} ({})", device, target, fs_type);
        self.mounter.mount(device, target, &fs_type).await
    }

    /// Unmount `target`. Succeeds without side effects if nothing is mounted.
    pub async fn unmount(&self, target: &str) -> Result<()> {
        if self.mounter.mount_entry(target).await?.is_none() {
            debug!("{} is not mounted", target);
            return Ok(());
        }

        info!("Unmounting {}", target);
        self.mounter.unmount(target).await
    }

    /// Filesystem to mount with, formatting the device if it is blank
    async fn select_fs_type(&self, device: &str, target: &str, requested: &str) -> Result<String> {
        match self.mounter.detect_fs_type(device).await? {
            Some(found) if requested.is_empty() || found == requested => Ok(found),
            Some(found) => Err(mount_error(
                device,
                target,
                format!(
                    "device holds a {} filesystem, {} was requested",
                    found, requested
                ),
            )),
            None => {
                let fs_type = if requested.is_empty() {
                    self.default_fs_type.as_str()
                } else {
                    requested
                };
                info!("{} has no filesystem, formatting as {}", device, fs_type);
                self.mounter.format(device, fs_type).await?;
                Ok(fs_type.to_string())
            }
        }
    }
}

fn mount_error(device: &str, target: &str, reason: String) -> Error {
    Error::Mount {
        device: device.to_string(),
        target: target.to_string(),
        reason,
    }
}

/// Compare device paths, resolving symlinks such as `/dev/drbd/by-res/...`
fn same_device(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (Path::new(a).canonicalize(), Path::new(b).canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
