//! FlexVolume Action Dispatcher
//!
//! Maps the kubelet's `[action, args...]` vector onto cluster manager and
//! mount operations and renders exactly one [`Reply`]. Nothing is remembered
//! between invocations: every piece of state is read back from the cluster
//! manager or the mount table.

use crate::api::options::DriverOptions;
use crate::api::response::{ExitCode, Payload, Reply};
use crate::attach::{wait_for_assignment, wait_for_device_path};
use crate::domain::ports::{ClusterManager, Resource, RetryPolicy};
use crate::error::{Error, Result};
use crate::mount::MountController;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const NO_ACTION_MESSAGE: &str = "No driver action! Valid actions are: init, attach, detach, \
     mountdevice, unmountdevice, getvolumename, isattached";

// =============================================================================
// Driver Actions
// =============================================================================

/// Actions of the FlexVolume exec protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverAction {
    Init,
    Attach,
    WaitForAttach,
    Detach,
    MountDevice,
    UnmountDevice,
    Unmount,
    GetVolumeName,
    IsAttached,
}

impl DriverAction {
    /// Minimum length of the argument vector, action included
    pub fn min_args(self) -> usize {
        match self {
            DriverAction::Init | DriverAction::WaitForAttach => 1,
            DriverAction::UnmountDevice | DriverAction::Unmount | DriverAction::GetVolumeName => 2,
            DriverAction::Attach | DriverAction::Detach | DriverAction::IsAttached => 3,
            DriverAction::MountDevice => 4,
        }
    }

    /// Exit code for an operational failure of this action
    fn failure_exit(self) -> ExitCode {
        match self {
            DriverAction::Attach | DriverAction::Unmount | DriverAction::UnmountDevice => {
                ExitCode::Retry
            }
            _ => ExitCode::Usage,
        }
    }
}

impl FromStr for DriverAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "init" => Ok(DriverAction::Init),
            "attach" => Ok(DriverAction::Attach),
            "waitforattach" => Ok(DriverAction::WaitForAttach),
            "detach" => Ok(DriverAction::Detach),
            "mountdevice" => Ok(DriverAction::MountDevice),
            "unmountdevice" => Ok(DriverAction::UnmountDevice),
            "unmount" => Ok(DriverAction::Unmount),
            "getvolumename" => Ok(DriverAction::GetVolumeName),
            "isattached" => Ok(DriverAction::IsAttached),
            _ => Err(Error::UnsupportedAction {
                action: s.to_string(),
            }),
        }
    }
}

// =============================================================================
// FlexVolume API
// =============================================================================

/// Dispatches driver actions against injected collaborators
pub struct FlexVolumeApi {
    client: Arc<dyn ClusterManager>,
    mounts: MountController,
    poll: RetryPolicy,
}

impl FlexVolumeApi {
    pub fn new(client: Arc<dyn ClusterManager>, mounts: MountController, poll: RetryPolicy) -> Self {
        Self {
            client,
            mounts,
            poll,
        }
    }

    /// Run one invocation
    pub async fn call(&self, args: &[String]) -> Reply {
        let Some(name) = args.first() else {
            return Reply::failure(NO_ACTION_MESSAGE, ExitCode::Usage);
        };

        let action = match name.parse::<DriverAction>() {
            Ok(action) => action,
            Err(e) => {
                warn!("{}", e);
                return Reply::not_supported(e.to_string());
            }
        };

        if args.len() < action.min_args() {
            let e = Error::Usage(format!("{}: too few arguments passed: {:?}", name, args));
            warn!("{}", e);
            return Reply::failure(e.to_string(), ExitCode::Usage);
        }

        debug!("Dispatching {:?} with {} arguments", action, args.len() - 1);

        match self.dispatch(action, args).await {
            Ok(payload) => Reply::success(payload),
            Err(e) => {
                if e.is_manager_failure() {
                    error!("{} failed: {}", name, e);
                } else {
                    warn!("{} failed: {}", name, e);
                }
                let exit_code = if e.is_usage() {
                    ExitCode::Usage
                } else {
                    action.failure_exit()
                };
                Reply::failure(e.to_string(), exit_code)
            }
        }
    }

    async fn dispatch(&self, action: DriverAction, args: &[String]) -> Result<Payload> {
        match action {
            DriverAction::Init | DriverAction::WaitForAttach => Ok(Payload::Empty),
            DriverAction::Attach => self.attach(&args[1], &args[2]).await,
            DriverAction::Detach => self.detach(&args[1], &args[2]).await,
            DriverAction::MountDevice => self.mount_device(&args[1], &args[2], &args[3]).await,
            DriverAction::UnmountDevice | DriverAction::Unmount => self.unmount(&args[1]).await,
            DriverAction::GetVolumeName => self.get_volume_name(&args[1]),
            DriverAction::IsAttached => self.is_attached(&args[1], &args[2]).await,
        }
    }

    async fn attach(&self, raw_options: &str, node_name: &str) -> Result<Payload> {
        let opts = DriverOptions::parse(raw_options)?;
        let resource = Resource::new(opts.resource, node_name);

        match self.client.query_assigned(&resource).await {
            Ok(true) => info!("{} already assigned", resource),
            Ok(false) => self.client.assign(&resource).await?,
            Err(e) => {
                warn!(
                    "Could not check assignment of {}: {}, assigning anyway",
                    resource, e
                );
                self.client.assign(&resource).await?;
            }
        }

        let path = wait_for_device_path(self.client.as_ref(), &resource, self.poll).await?;
        Ok(Payload::Device(path))
    }

    async fn detach(&self, resource_name: &str, node_name: &str) -> Result<Payload> {
        let resource = Resource::new(resource_name, node_name);
        self.client.unassign(&resource).await?;
        Ok(Payload::Empty)
    }

    async fn mount_device(
        &self,
        target: &str,
        device_ref: &str,
        raw_options: &str,
    ) -> Result<Payload> {
        // Only the device path is needed, which does not depend on the node
        let request = DriverOptions::parse(raw_options)?.into_mount_request("");

        let device = if !request.resource.name.is_empty() {
            wait_for_device_path(self.client.as_ref(), &request.resource, self.poll).await?
        } else if !device_ref.is_empty() {
            device_ref.to_string()
        } else {
            return Err(Error::Usage(
                "mountdevice: options name no resource and no device was given".to_string(),
            ));
        };

        if request.read_write == "ro" {
            debug!(
                "{} requested read-only, mounting with default options",
                request.resource.name
            );
        }
        self.mounts.mount(&device, target, &request.fs_type).await?;
        Ok(Payload::Empty)
    }

    async fn unmount(&self, target: &str) -> Result<Payload> {
        self.mounts.unmount(target).await?;
        Ok(Payload::Empty)
    }

    fn get_volume_name(&self, raw_options: &str) -> Result<Payload> {
        let opts = DriverOptions::parse(raw_options)?;
        Ok(Payload::VolumeName(opts.resource))
    }

    async fn is_attached(&self, raw_options: &str, node_name: &str) -> Result<Payload> {
        let opts = DriverOptions::parse(raw_options)?;
        let resource = Resource::new(opts.resource, node_name);

        if wait_for_assignment(self.client.as_ref(), &resource, self.poll).await? {
            Ok(Payload::Attached(true))
        } else {
            Err(Error::NotAttached {
                resource: resource.name,
            })
        }
    }
}
