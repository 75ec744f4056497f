//! Process Table
//!
//! Fixed arena of `NPROC` process descriptors. A `Pid` is the slot index and
//! stays valid for the lifetime of the machine. A slot whose process never
//! became runnable can be handed back with [`ProcessTable::release`].

use alloc::vec::Vec;

use super::context::TrapFrame;
use crate::config::NPROC;

/// Process ID type (slot index in the process table)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub usize);

impl Pid {
    /// Get the slot index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl core::fmt::Display for Pid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Slot has no live process
    Free,
    /// Linked into the ready queue
    Ready,
    /// Currently running
    Running,
    /// Linked into the blocked queue
    Blocked,
    /// Process has exited
    Zombie,
}

impl ProcessState {
    /// `Free` and `Zombie` never run again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Free | Self::Zombie)
    }
}

/// Scheduler queue a descriptor is linked into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    /// Ready queue
    Ready,
    /// Blocked queue
    Blocked,
}

/// Process descriptor
#[derive(Debug, Clone)]
pub struct Process {
    pid: Pid,
    in_use: bool,
    pub(crate) state: ProcessState,
    pub(crate) parent: Option<Pid>,
    pub(crate) queue_next: Option<Pid>,
    pub(crate) queue: Option<QueueKind>,
    /// Saved user registers; `epc` holds the entry point until first run
    pub trapframe: TrapFrame,
}

impl Process {
    fn empty(pid: Pid) -> Self {
        Self {
            pid,
            in_use: false,
            state: ProcessState::Free,
            parent: None,
            queue_next: None,
            queue: None,
            trapframe: TrapFrame::default(),
        }
    }

    /// Process ID
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Current state
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Creating process, if any
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    /// Queue this descriptor is linked into
    pub fn queue(&self) -> Option<QueueKind> {
        self.queue
    }
}

/// Process table
pub struct ProcessTable {
    slots: Vec<Process>,
}

impl ProcessTable {
    /// Create a table of `NPROC` free slots.
    pub fn new() -> Self {
        Self {
            slots: (0..NPROC).map(|i| Process::empty(Pid(i))).collect(),
        }
    }

    /// Claim the first unused slot. The descriptor stays `Free` and
    /// unlinked until the scheduler enqueues it.
    pub fn alloc(&mut self, parent: Option<Pid>) -> Option<Pid> {
        let slot = self.slots.iter_mut().find(|p| !p.in_use)?;
        slot.in_use = true;
        slot.parent = parent;
        slot.trapframe = TrapFrame::default();
        log::debug!("[PROC] allocated process {}", slot.pid);
        Some(slot.pid)
    }

    /// Get a descriptor
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.slots.get(pid.0)
    }

    /// Get a mutable descriptor
    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.slots.get_mut(pid.0)
    }

    /// Iterate over every slot
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter()
    }

    /// Number of allocated slots
    pub fn allocated(&self) -> usize {
        self.slots.iter().filter(|p| p.in_use).count()
    }

    /// Return a slot to the free pool. Refused for a slot that is queued
    /// or has left the `Free` state.
    pub fn release(&mut self, pid: Pid) -> bool {
        let Some(slot) = self.slots.get_mut(pid.0) else {
            return false;
        };
        if !slot.in_use || slot.queue.is_some() || slot.state != ProcessState::Free {
            return false;
        }
        *slot = Process::empty(pid);
        log::debug!("[PROC] released process {}", pid);
        true
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}
