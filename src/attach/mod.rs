//! Attachment polling
//!
//! Bounded, fixed-interval polling against the cluster manager:
//! - resolver: wait for a resource's local device path
//! - waiter: wait for assignment confirmation

pub mod resolver;
pub mod waiter;

pub use resolver::wait_for_device_path;
pub use waiter::wait_for_assignment;
