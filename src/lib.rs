//! sizesync library
//!
//! Compare a local tree with a remote one over SSH by file size and pull the
//! files the operator picks

pub mod cli;
pub mod config;
pub mod diff;
pub mod error;
pub mod fs_enum;
pub mod logger;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod progress;
pub mod remote;
pub mod select;
pub mod ssh;
pub mod sync;
pub mod transfer;
pub mod transport;
