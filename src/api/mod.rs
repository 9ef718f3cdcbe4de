//! FlexVolume exec protocol
//!
//! - options: JSON options argument
//! - response: status envelope and exit codes
//! - dispatcher: action routing

pub mod dispatcher;
pub mod options;
pub mod response;

pub use dispatcher::{DriverAction, FlexVolumeApi};
pub use options::DriverOptions;
pub use response::{ExitCode, Payload, Reply, Response};
