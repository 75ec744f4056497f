//! Host abstraction layer.
//!
//! Everything the kernel needs from the machine it runs on: a console, a
//! power switch and the context-switch primitive.

use crate::process::{Pid, TrapFrame};

/// Services provided by the host machine.
pub trait Host {
    /// Write raw bytes to the host console.
    fn console_write(&mut self, bytes: &[u8]);

    /// Power the machine off with `code`. Called at most once per machine.
    fn shutdown(&mut self, code: i64);

    /// Enter user mode for `pid` with the given register state.
    fn switch_to(&mut self, pid: Pid, frame: &TrapFrame);
}

/// Formatted console output through [`Host::console_write`].
pub struct Console<'a, H: Host + ?Sized>(pub &'a mut H);

impl<H: Host + ?Sized> core::fmt::Write for Console<'_, H> {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.0.console_write(s.as_bytes());
        Ok(())
    }
}
