//! DRBD FlexVolume Driver
//!
//! Installed under the kubelet's volume plugin directory and executed once per
//! action as `drbd-flexvolume <action> [args...]`. Prints a single JSON status
//! object on stdout and exits with the matching code; logs go to stderr.

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use drbd_flexvolume::{
    DrbdManageClient, ExitCode, FlexVolumeApi, MountController, PluginConfig, Reply,
    SystemMounter,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// DRBD FlexVolume driver for Kubernetes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// drbdmanage executable
    #[arg(long, env = "DRBD_FLEXVOLUME_DRBDMANAGE", default_value = "drbdmanage")]
    drbdmanage_bin: String,

    /// Directory holding DRBD device nodes
    #[arg(long, env = "DRBD_FLEXVOLUME_DEV_DIR", default_value = "/dev")]
    dev_dir: PathBuf,

    /// Polls of the cluster manager before giving up
    #[arg(long, env = "DRBD_FLEXVOLUME_POLL_ATTEMPTS", default_value = "4")]
    poll_attempts: u32,

    /// Delay between polls in milliseconds
    #[arg(long, env = "DRBD_FLEXVOLUME_POLL_INTERVAL_MS", default_value = "1000")]
    poll_interval_ms: u64,

    /// Assign resources to nodes as diskless clients
    #[arg(long, env = "DRBD_FLEXVOLUME_CLIENT_ASSIGN")]
    client_assign: bool,

    /// Filesystem created on blank devices when none is requested
    #[arg(long, env = "DRBD_FLEXVOLUME_DEFAULT_FS", default_value = "ext4")]
    default_fs_type: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    /// Driver action
    action: Option<String>,

    /// Action arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let reply = usage_reply(&e);
            println!("{}", reply.to_json());
            std::process::exit(reply.exit_code.code());
        }
    };

    init_logging(&args);

    let argv: Vec<String> = args
        .action
        .iter()
        .chain(args.args.iter())
        .cloned()
        .collect();

    let reply = match build_api(&args) {
        Ok(api) => api.call(&argv).await,
        Err(e) => Reply::failure(format!("{:#}", e), ExitCode::Usage),
    };

    debug!("Replying {} with exit code {}", reply.to_json(), reply.exit_code.code());
    println!("{}", reply.to_json());
    std::process::exit(reply.exit_code.code());
}

/// Status object for arguments the driver could not parse
fn usage_reply(e: &clap::Error) -> Reply {
    let rendered = e.to_string();
    let message = rendered.lines().next().unwrap_or_default().trim();
    let message = message.strip_prefix("error: ").unwrap_or(message);
    Reply::failure(message, ExitCode::Usage)
}

fn build_api(args: &Args) -> anyhow::Result<FlexVolumeApi> {
    let config = PluginConfig {
        drbdmanage_bin: args.drbdmanage_bin.clone(),
        dev_dir: args.dev_dir.clone(),
        client_assign: args.client_assign,
        default_fs_type: args.default_fs_type.clone(),
        ..Default::default()
    }
    .with_poll(args.poll_attempts, args.poll_interval_ms)
    .context("invalid driver configuration")?;

    let client = DrbdManageClient::new(&config.drbdmanage_bin, &config.dev_dir)
        .with_client_assign(config.client_assign);
    let mounts = MountController::new(Arc::new(SystemMounter::new()), &config.default_fs_type);

    Ok(FlexVolumeApi::new(Arc::new(client), mounts, config.poll))
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout is reserved for the status object
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
