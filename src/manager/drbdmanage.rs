//! drbdmanage Cluster Manager Client
//!
//! Drives the `drbdmanage` CLI to assign and unassign resources and to query
//! assignment and volume state. Queries use the machine-readable (`-m`)
//! output, one comma-separated row per object.

use crate::domain::ports::{ClusterManager, Resource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Output fragments drbdmanage prints when an assignment is already gone
const NOT_ASSIGNED_MARKERS: &[&str] = &["not assigned", "No assignment"];

/// Output fragments drbdmanage prints when an assignment already exists
const ALREADY_ASSIGNED_MARKERS: &[&str] = &["already assigned", "assignment already exists"];

// =============================================================================
// Command Output
// =============================================================================

/// Captured result of one drbdmanage invocation
#[derive(Debug)]
struct CommandOutput {
    success: bool,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn contains_any(&self, markers: &[&str]) -> bool {
        markers
            .iter()
            .any(|m| self.stdout.contains(m) || self.stderr.contains(m))
    }

    /// Best human-readable failure reason
    fn reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

// =============================================================================
// drbdmanage Client
// =============================================================================

/// Cluster manager client backed by the drbdmanage CLI
#[derive(Debug, Clone)]
pub struct DrbdManageClient {
    bin: String,
    dev_dir: PathBuf,
    client_assign: bool,
}

impl DrbdManageClient {
    /// Create a new client
    pub fn new(bin: impl Into<String>, dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            dev_dir: dev_dir.into(),
            client_assign: false,
        }
    }

    /// Assign resources as diskless clients
    pub fn with_client_assign(mut self, client_assign: bool) -> Self {
        self.client_assign = client_assign;
        self
    }

    async fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        debug!("Running {} {}", self.bin, args.join(" "));

        let output = Command::new(&self.bin)
            .args(args)
            .output()
            .await
            .map_err(|e| Error::ManagerCommand {
                command: self.describe(args),
                reason: e.to_string(),
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run a query and return its stdout, failing on a non-zero exit
    async fn query(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.success {
            return Err(Error::ManagerCommand {
                command: self.describe(args),
                reason: output.reason(),
            });
        }
        Ok(output.stdout)
    }

    fn describe(&self, args: &[&str]) -> String {
        format!("{} {}", self.bin, args.first().copied().unwrap_or_default())
    }
}

#[async_trait]
impl ClusterManager for DrbdManageClient {
    async fn assign(&self, resource: &Resource) -> Result<()> {
        info!(
            "Assigning resource {} to node {}",
            resource.name, resource.node_name
        );

        let mut args = vec![
            "assign-resource",
            resource.name.as_str(),
            resource.node_name.as_str(),
        ];
        if self.client_assign {
            args.push("--client");
        }

        let output = self.run(&args).await.map_err(|e| Error::Assignment {
            resource: resource.name.clone(),
            node: resource.node_name.clone(),
            reason: e.to_string(),
        })?;

        if output.success || output.contains_any(ALREADY_ASSIGNED_MARKERS) {
            return Ok(());
        }

        Err(Error::Assignment {
            resource: resource.name.clone(),
            node: resource.node_name.clone(),
            reason: output.reason(),
        })
    }

    async fn unassign(&self, resource: &Resource) -> Result<()> {
        info!(
            "Unassigning resource {} from node {}",
            resource.name, resource.node_name
        );

        let output = self
            .run(&[
                "unassign-resource",
                resource.name.as_str(),
                resource.node_name.as_str(),
                "--quiet",
            ])
            .await
            .map_err(|e| Error::Unassignment {
                resource: resource.name.clone(),
                node: resource.node_name.clone(),
                reason: e.to_string(),
            })?;

        if output.success {
            return Ok(());
        }

        if output.contains_any(NOT_ASSIGNED_MARKERS) {
            warn!("Resource {} was not assigned, nothing to do", resource);
            return Ok(());
        }

        Err(Error::Unassignment {
            resource: resource.name.clone(),
            node: resource.node_name.clone(),
            reason: output.reason(),
        })
    }

    async fn query_device_path(&self, resource: &Resource) -> Result<Option<String>> {
        let stdout = self
            .query(&[
                "list-volumes",
                "--machine-readable",
                "--resources",
                resource.name.as_str(),
            ])
            .await?;

        let minor = match parse_volume_minor(&stdout, &resource.name) {
            Some(minor) => minor,
            None => return Ok(None),
        };

        Ok(existing_device_path(&self.dev_dir, minor))
    }

    async fn query_assigned(&self, resource: &Resource) -> Result<bool> {
        let stdout = self
            .query(&[
                "list-assignments",
                "--machine-readable",
                "--resources",
                resource.name.as_str(),
                "--nodes",
                resource.node_name.as_str(),
            ])
            .await?;

        Ok(parse_assigned(&stdout, resource))
    }
}

// =============================================================================
// Output Parsing
// =============================================================================

/// Minor number of volume 0 of `name` from `list-volumes -m` rows
/// (`resource,volume,size_kib,minor,...`)
fn parse_volume_minor(stdout: &str, name: &str) -> Option<u32> {
    stdout
        .lines()
        .map(|line| line.split(',').map(str::trim).collect::<Vec<_>>())
        .filter(|fields| fields.len() >= 4 && fields[0] == name && fields[1] == "0")
        .find_map(|fields| fields[3].parse().ok())
}

/// Whether `list-assignments -m` rows (`node,resource,...`) contain the pair
fn parse_assigned(stdout: &str, resource: &Resource) -> bool {
    stdout.lines().any(|line| {
        let mut fields = line.split(',').map(str::trim);
        fields.next() == Some(resource.node_name.as_str())
            && fields.next() == Some(resource.name.as_str())
    })
}

/// `/dev/drbd<minor>` if the device node exists on this host
fn existing_device_path(dev_dir: &Path, minor: u32) -> Option<String> {
    let path = dev_dir.join(format!("drbd{}", minor));
    if path.exists() {
        Some(path.to_string_lossy().into_owned())
    } else {
        debug!("Device node {} not present yet", path.display());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Install a shell script standing in for drbdmanage. `body` is the arm
    /// list of a `case "$1"` over the subcommand; every call is logged to
    /// `calls.log` next to the script.
    fn fake_drbdmanage(tmp: &TempDir, body: &str) -> DrbdManageClient {
        let bin = tmp.path().join("drbdmanage");
        let log = tmp.path().join("calls.log");
        let script = format!(
            "#!/bin/sh\necho \"$@\" >> '{}'\ncase \"$1\" in\n{}\n*) echo \"unknown command $1\" >&2; exit 64 ;;\nesac\n",
            log.display(),
            body
        );
        std::fs::write(&bin, script).unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();
        DrbdManageClient::new(bin.to_string_lossy(), tmp.path())
    }

    fn calls(tmp: &TempDir) -> Vec<String> {
        std::fs::read_to_string(tmp.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_volume_minor() {
        let out = "r0,0,1048576,100,connect|deploy\nr0,1,1048576,101,connect|deploy\n";
        assert_eq!(parse_volume_minor(out, "r0"), Some(100));
        assert_eq!(parse_volume_minor(out, "r1"), None);
        assert_eq!(parse_volume_minor("", "r0"), None);
        assert_eq!(parse_volume_minor("r0,0,1048576,pending", "r0"), None);
    }

    #[test]
    fn test_parse_assigned() {
        let res = Resource::new("r0", "nodeA");
        assert!(parse_assigned("nodeA,r0,1,connect|deploy\n", &res));
        assert!(parse_assigned("nodeB,r0,0,x\nnodeA, r0 ,1,x\n", &res));
        assert!(!parse_assigned("nodeB,r0,1,connect|deploy\n", &res));
        assert!(!parse_assigned("nodeA,r00,1,connect|deploy\n", &res));
        assert!(!parse_assigned("", &res));
    }

    #[test]
    fn test_existing_device_path() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(existing_device_path(tmp.path(), 100), None);

        std::fs::write(tmp.path().join("drbd100"), b"").unwrap();
        let path = existing_device_path(tmp.path(), 100).unwrap();
        assert!(path.ends_with("drbd100"));
    }

    #[test]
    fn test_command_output_reason() {
        let output = CommandOutput {
            success: false,
            stdout: "Error: resource not assigned\n".into(),
            stderr: String::new(),
        };
        assert_eq!(output.reason(), "Error: resource not assigned");
        assert!(output.contains_any(NOT_ASSIGNED_MARKERS));
        assert!(!output.contains_any(ALREADY_ASSIGNED_MARKERS));
    }

    #[tokio::test]
    async fn test_missing_binary_is_manager_error() {
        let client = DrbdManageClient::new("/nonexistent/drbdmanage", "/dev");
        let res = Resource::new("r0", "nodeA");

        assert_matches!(
            client.query_assigned(&res).await,
            Err(Error::ManagerCommand { .. })
        );
        assert_matches!(client.assign(&res).await, Err(Error::Assignment { .. }));
        assert_matches!(
            client.unassign(&res).await,
            Err(Error::Unassignment { .. })
        );
    }

    #[tokio::test]
    async fn test_unassign_not_assigned_succeeds() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "unassign-resource) echo \"Error: r0 is not assigned to nodeA\"; exit 1 ;;",
        );

        client.unassign(&Resource::new("r0", "nodeA")).await.unwrap();

        assert_eq!(calls(&tmp), vec!["unassign-resource r0 nodeA --quiet"]);
    }

    #[tokio::test]
    async fn test_unassign_other_failure_is_error() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "unassign-resource) echo \"Error: Object not found\" >&2; exit 1 ;;",
        );

        let err = client
            .unassign(&Resource::new("r0", "nodeA"))
            .await
            .unwrap_err();

        assert_matches!(&err, Error::Unassignment { reason, .. } if reason == "Error: Object not found");
    }

    #[tokio::test]
    async fn test_assign_already_assigned_succeeds() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "assign-resource) echo \"Error: r0 already assigned to nodeA\" >&2; exit 1 ;;",
        )
        .with_client_assign(true);

        client.assign(&Resource::new("r0", "nodeA")).await.unwrap();

        assert_eq!(calls(&tmp), vec!["assign-resource r0 nodeA --client"]);
    }

    #[tokio::test]
    async fn test_assign_rejected_is_error() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "assign-resource) echo \"Error: node nodeA is offline\" >&2; exit 1 ;;",
        );

        let err = client
            .assign(&Resource::new("r0", "nodeA"))
            .await
            .unwrap_err();

        assert_matches!(&err, Error::Assignment { reason, .. } if reason == "Error: node nodeA is offline");
        assert_eq!(calls(&tmp), vec!["assign-resource r0 nodeA"]);
    }

    #[tokio::test]
    async fn test_query_device_path_waits_for_device_node() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "list-volumes) echo \"r0,0,1048576,100,connect|deploy\" ;;",
        );
        let res = Resource::new("r0", "nodeA");

        assert_eq!(client.query_device_path(&res).await.unwrap(), None);

        let node = tmp.path().join("drbd100");
        std::fs::write(&node, b"").unwrap();
        assert_eq!(
            client.query_device_path(&res).await.unwrap(),
            Some(node.to_string_lossy().into_owned())
        );
        assert_eq!(
            calls(&tmp)[0],
            "list-volumes --machine-readable --resources r0"
        );
    }

    #[tokio::test]
    async fn test_query_assigned_reads_assignment_rows() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "list-assignments) echo \"nodeA,r0,1,connect|deploy\" ;;",
        );

        assert!(client
            .query_assigned(&Resource::new("r0", "nodeA"))
            .await
            .unwrap());
        assert!(!client
            .query_assigned(&Resource::new("r1", "nodeA"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_query_failure_is_manager_error() {
        let tmp = TempDir::new().unwrap();
        let client = fake_drbdmanage(
            &tmp,
            "list-volumes) echo \"Error: drbdmanaged not running\" >&2; exit 1 ;;",
        );

        let err = client
            .query_device_path(&Resource::new("r0", "nodeA"))
            .await
            .unwrap_err();

        assert_matches!(&err, Error::ManagerCommand { reason, .. } if reason == "Error: drbdmanaged not running");
    }
}
