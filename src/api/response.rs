//! Response envelope
//!
//! Every invocation prints exactly one JSON object:
//! `{"status": ..., "message"?: ..., "device"?: ..., "attached"?: ..., "volumeName"?: ...}`
//! and exits with the matching [`ExitCode`].

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

// =============================================================================
// Payloads
// =============================================================================

/// Action-specific data carried by a successful response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Empty,
    Device(String),
    Attached(bool),
    VolumeName(String),
}

// =============================================================================
// Response
// =============================================================================

/// Outcome of a driver action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Success(Payload),
    Failure(String),
    NotSupported(String),
}

impl Response {
    pub fn status(&self) -> &'static str {
        match self {
            Response::Success(_) => "Success",
            Response::Failure(_) => "Failure",
            Response::NotSupported(_) => "NotSupported",
        }
    }
}

impl Serialize for Response {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("status", self.status())?;
        match self {
            Response::Success(Payload::Empty) => {}
            Response::Success(Payload::Device(device)) => map.serialize_entry("device", device)?,
            // The FlexVolume protocol carries this flag as a string
            Response::Success(Payload::Attached(attached)) => {
                map.serialize_entry("attached", &attached.to_string())?
            }
            Response::Success(Payload::VolumeName(name)) => {
                map.serialize_entry("volumeName", name)?
            }
            Response::Failure(message) | Response::NotSupported(message) => {
                map.serialize_entry("message", message)?
            }
        }
        map.end()
    }
}

// =============================================================================
// Exit Codes
// =============================================================================

/// Process exit status reported alongside the envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    /// Operational failure, the orchestrator may retry
    Retry,
    /// Usage, parse or unsupported action; retrying will not help
    Usage,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::Retry => 1,
            ExitCode::Usage => 2,
        }
    }
}

// =============================================================================
// Reply
// =============================================================================

/// Envelope plus exit code: the complete result of one invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub response: Response,
    pub exit_code: ExitCode,
}

impl Reply {
    pub fn success(payload: Payload) -> Self {
        Self {
            response: Response::Success(payload),
            exit_code: ExitCode::Success,
        }
    }

    pub fn failure(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            response: Response::Failure(message.into()),
            exit_code,
        }
    }

    pub fn not_supported(message: impl Into<String>) -> Self {
        Self {
            response: Response::NotSupported(message.into()),
            exit_code: ExitCode::Usage,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.response).unwrap_or_else(|e| encoding_failure(&e))
    }
}

/// Failure envelope used when the response itself cannot be serialized
fn encoding_failure(e: &dyn std::fmt::Display) -> String {
    serde_json::json!({
        "status": "Failure",
        "message": format!("failed to encode response: {}", e),
    })
    .to_string()
}
