//! Driver options
//!
//! The kubelet passes volume options as a single JSON object argument. Only
//! the keys below are read; everything else (pod name, service account, ...)
//! is ignored.

use crate::domain::ports::{MountRequest, Resource};
use crate::error::{Error, Result};
use serde::Deserialize;

/// Options attached to a FlexVolume invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DriverOptions {
    #[serde(rename = "kubernetes.io/fsType", default)]
    pub fs_type: String,

    #[serde(rename = "kubernetes.io/readwrite", default)]
    pub read_write: String,

    #[serde(default)]
    pub resource: String,
}

impl DriverOptions {
    /// Parse options, echoing the raw string back on failure
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|_| Error::OptionsParse {
            raw: raw.to_string(),
        })
    }

    pub fn into_mount_request(self, node_name: impl Into<String>) -> MountRequest {
        MountRequest {
            resource: Resource::new(self.resource, node_name),
            fs_type: self.fs_type,
            read_write: self.read_write,
        }
    }
}
