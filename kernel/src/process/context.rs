//! Process Context
//!
//! Saved user register state of a RISC-V hart, captured on trap entry.

/// User registers saved on trap entry, in `x1..x31` order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct TrapFrame {
    /// x1, return address
    pub ra: u64,
    /// x2, stack pointer
    pub sp: u64,
    /// x3, global pointer
    pub gp: u64,
    /// x4, thread pointer
    pub tp: u64,
    /// x5
    pub t0: u64,
    /// x6
    pub t1: u64,
    /// x7
    pub t2: u64,
    /// x8, frame pointer
    pub s0: u64,
    /// x9
    pub s1: u64,
    /// x10, syscall number on entry and return value on exit
    pub a0: u64,
    /// x11
    pub a1: u64,
    /// x12
    pub a2: u64,
    /// x13
    pub a3: u64,
    /// x14
    pub a4: u64,
    /// x15
    pub a5: u64,
    /// x16
    pub a6: u64,
    /// x17
    pub a7: u64,
    /// x18
    pub s2: u64,
    /// x19
    pub s3: u64,
    /// x20
    pub s4: u64,
    /// x21
    pub s5: u64,
    /// x22
    pub s6: u64,
    /// x23
    pub s7: u64,
    /// x24
    pub s8: u64,
    /// x25
    pub s9: u64,
    /// x26
    pub s10: u64,
    /// x27
    pub s11: u64,
    /// x28
    pub t3: u64,
    /// x29
    pub t4: u64,
    /// x30
    pub t5: u64,
    /// x31
    pub t6: u64,
    /// Saved user program counter
    pub epc: u64,
}

impl TrapFrame {
    /// Frame for a process that starts at `entry` with stack `sp`.
    pub fn new(entry: u64, sp: u64) -> Self {
        Self {
            epc: entry,
            sp,
            ..Self::default()
        }
    }

    /// Frame pointer (`s0`)
    pub fn fp(&self) -> u64 {
        self.s0
    }

    /// Argument registers `a0..a7`.
    pub fn args(&self) -> [u64; 8] {
        [
            self.a0, self.a1, self.a2, self.a3, self.a4, self.a5, self.a6, self.a7,
        ]
    }
}
