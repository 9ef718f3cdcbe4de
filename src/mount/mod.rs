//! Local mount handling
//!
//! - controller: idempotent mount/unmount logic over the `Mounter` port
//! - system: host implementation backed by mountinfo and util-linux tools

pub mod controller;
pub mod system;

pub use controller::MountController;
pub use system::SystemMounter;
