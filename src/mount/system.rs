//! Host Mounter
//!
//! Reads mount state from `/proc/self/mountinfo` and shells out to the
//! util-linux tools (`mount`, `umount`, `blkid`, `mkfs.*`) for changes.

use crate::domain::ports::{MountEntry, Mounter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// `blkid` exit status when no signature was found on the device
const BLKID_NOTHING_FOUND: i32 = 2;

/// Mounter operating on the host's mount namespace
#[derive(Debug, Clone)]
pub struct SystemMounter {
    mountinfo: PathBuf,
}

impl Default for SystemMounter {
    fn default() -> Self {
        Self {
            mountinfo: PathBuf::from("/proc/self/mountinfo"),
        }
    }
}

impl SystemMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read mounts from another mountinfo file
    pub fn with_mountinfo(path: impl Into<PathBuf>) -> Self {
        Self {
            mountinfo: path.into(),
        }
    }

    async fn read_mounts(&self) -> Result<Vec<MountEntry>> {
        let contents = tokio::fs::read_to_string(&self.mountinfo).await?;
        Ok(parse_mountinfo(&contents))
    }
}

#[async_trait]
impl Mounter for SystemMounter {
    async fn mount_entry(&self, target: &str) -> Result<Option<MountEntry>> {
        let target = Path::new(target)
            .canonicalize()
            .unwrap_or_else(|_| PathBuf::from(target));
        let target = target.to_string_lossy();

        // Last entry wins for stacked mounts
        Ok(self
            .read_mounts()
            .await?
            .into_iter()
            .rev()
            .find(|m| m.target == target))
    }

    async fn detect_fs_type(&self, device: &str) -> Result<Option<String>> {
        let output = Command::new("blkid")
            .args(["-p", "-s", "TYPE", "-o", "value", device])
            .output()
            .await
            .map_err(|e| Error::Mount {
                device: device.to_string(),
                target: String::new(),
                reason: format!("failed to run blkid: {}", e),
            })?;

        if output.status.code() == Some(BLKID_NOTHING_FOUND) {
            return Ok(None);
        }

        if !output.status.success() {
            return Err(Error::Mount {
                device: device.to_string(),
                target: String::new(),
                reason: format!(
                    "blkid failed: {}",
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let fs_type = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!("blkid reports {:?} on {}", fs_type, device);
        Ok(if fs_type.is_empty() { None } else { Some(fs_type) })
    }

    async fn format(&self, device: &str, fs_type: &str) -> Result<()> {
        let mut cmd = Command::new(format!("mkfs.{}", fs_type));
        if fs_type.starts_with("ext") {
            cmd.arg("-F");
        }
        cmd.arg(device);

        run(cmd, "mkfs").await.map_err(|reason| Error::Mount {
            device: device.to_string(),
            target: String::new(),
            reason,
        })
    }

    async fn mount(&self, device: &str, target: &str, fs_type: &str) -> Result<()> {
        let mut cmd = Command::new("mount");
        cmd.args(["-t", fs_type, device, target]);

        run(cmd, "mount").await.map_err(|reason| Error::Mount {
            device: device.to_string(),
            target: target.to_string(),
            reason,
        })
    }

    async fn unmount(&self, target: &str) -> Result<()> {
        let mut cmd = Command::new("umount");
        cmd.arg(target);

        run(cmd, "umount").await.map_err(|reason| Error::Unmount {
            target: target.to_string(),
            reason,
        })
    }
}

/// Run a tool to completion, returning its stderr as the failure reason
async fn run(mut cmd: Command, tool: &str) -> std::result::Result<(), String> {
    let output = cmd
        .output()
        .await
        .map_err(|e| format!("failed to run {}: {}", tool, e))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    warn!("{} exited with {}: {}", tool, output.status, stderr);
    Err(format!("{} failed: {}", tool, stderr))
}

// =============================================================================
// mountinfo Parsing
// =============================================================================

/// Parse `/proc/self/mountinfo` lines:
/// `id parent maj:min root mountpoint options [optional...] - fstype source super`
fn parse_mountinfo(contents: &str) -> Vec<MountEntry> {
    contents
        .lines()
        .filter_map(|line| {
            let (left, right) = line.split_once(" - ")?;
            let target = left.split_whitespace().nth(4)?;
            let mut right = right.split_whitespace();
            let fs_type = right.next()?;
            let source = right.next()?;
            Some(MountEntry {
                source: unescape(source),
                target: unescape(target),
                fs_type: fs_type.to_string(),
            })
        })
        .collect()
}

/// Decode the kernel's octal escapes (`\040` for space and friends)
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let octal = &bytes[i + 1..i + 4];
            if octal.iter().all(|b| (b'0'..=b'7').contains(b)) {
                let value = octal.iter().fold(0u32, |acc, b| acc * 8 + u32::from(b - b'0'));
                if let Ok(b) = u8::try_from(value) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
