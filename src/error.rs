//! Error types for the DRBD FlexVolume driver
//!
//! Every failure a driver action can hit is modelled here. Errors never escape
//! the dispatcher: they are rendered into a `Failure`/`NotSupported` response
//! with an exit code chosen per action.

use thiserror::Error;

/// Unified error type for the driver
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Invocation Errors
    // =========================================================================
    #[error("{0}")]
    Usage(String),

    #[error("couldn't parse options from {raw}")]
    OptionsParse { raw: String },

    #[error("Unsupported driver action: {action:?}")]
    UnsupportedAction { action: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Cluster Manager Errors
    // =========================================================================
    #[error("failed to assign resource {resource:?} to node {node:?}: {reason}")]
    Assignment {
        resource: String,
        node: String,
        reason: String,
    },

    #[error("failed to unassign resource {resource:?} from node {node:?}: {reason}")]
    Unassignment {
        resource: String,
        node: String,
        reason: String,
    },

    #[error("{command} failed: {reason}")]
    ManagerCommand { command: String, reason: String },

    #[error("resource {resource:?} not attached")]
    NotAttached { resource: String },

    #[error("timed out after {attempts} attempts waiting for {what} of resource {resource:?}")]
    Timeout {
        resource: String,
        what: String,
        attempts: u32,
    },

    // =========================================================================
    // Mount Errors
    // =========================================================================
    #[error("failed to mount {device} at {target}: {reason}")]
    Mount {
        device: String,
        target: String,
        reason: String,
    },

    #[error("failed to unmount {target}: {reason}")]
    Unmount { target: String, reason: String },

    // =========================================================================
    // Wrapped Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors caused by how the driver was invoked rather than by cluster or
    /// node state. The orchestrator should not retry these unchanged.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::Usage(_)
                | Error::OptionsParse { .. }
                | Error::UnsupportedAction { .. }
                | Error::Configuration(_)
        )
    }

    /// Failures reported by the cluster manager itself, as opposed to a
    /// condition that simply has not been reached yet.
    pub fn is_manager_failure(&self) -> bool {
        matches!(
            self,
            Error::Assignment { .. } | Error::Unassignment { .. } | Error::ManagerCommand { .. }
        )
    }
}

/// Result type alias for the driver
pub type Result<T> = std::result::Result<T, Error>;
