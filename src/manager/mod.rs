//! Cluster Manager Adapters
//!
//! - drbdmanage: DRBD9 resource assignment via the drbdmanage CLI

pub mod drbdmanage;

pub use drbdmanage::DrbdManageClient;
