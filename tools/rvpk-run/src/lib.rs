//! rvpk-run: host launcher for the rvpk kernel.
//!
//! Opens an application image on the host file system, boots it into a
//! [`rvpk_kernel::Machine`] backed by [`host::StdHost`] and reports what was
//! loaded.

pub mod cli;
pub mod error;
pub mod host;
pub mod image;
pub mod logger;
pub mod output;
pub mod run;
