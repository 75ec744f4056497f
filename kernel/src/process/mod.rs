//! Process Management
//!
//! Process descriptors and their saved register state. Queue membership and
//! state transitions belong to the scheduler.

pub mod context;
pub mod table;

pub use context::TrapFrame;
pub use table::{Pid, Process, ProcessState, ProcessTable, QueueKind};
