//! RVPK Kernel Library
//!
//! Bare-mode application kernel for an emulated RISC-V machine. The host
//! hands the kernel one linked executable; the kernel copies its loadable
//! segments into guest memory, extracts the function symbol table, and runs
//! the resulting process under a cooperative scheduler.
//!
//! # Architecture
//!
//! - `loader`: ELF64 header/segment validation and loading, symbol-table
//!   extraction
//! - `crash`: address-to-symbol resolution and stack walking
//! - `process`: fixed process arena and trap frames
//! - `scheduler`: ready/blocked queues, wake-up and shutdown decision
//! - `syscall`: print / exit / backtrace dispatch
//! - `machine`: the system context threading all of the above
//! - `hal`: host collaborators (console, power, context switch)
//! - `boot`: command-line parsing and the application boot path

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod boot;
pub mod config;
pub mod crash;
pub mod hal;
pub mod loader;
pub mod machine;
pub mod memory;
pub mod process;
pub mod scheduler;
pub mod syscall;

#[cfg(test)]
mod testing;

#[cfg(test)]
mod tests;

pub use machine::{Fault, Machine, PowerState, ScheduleOutcome};
