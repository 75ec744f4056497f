//! Cooperative process scheduler.
//!
//! Ready and blocked FIFO queues are intrusive singly linked lists threaded
//! through the process table by `Pid`. A descriptor is linked into at most
//! one queue, and its state always names the queue it sits in.
//!
//! There is no preemption: a process gives up the hart only by trapping
//! into the kernel, which then calls [`Machine::schedule`].
//!
//! [`Machine::schedule`]: crate::Machine::schedule

use alloc::vec::Vec;

use crate::machine::Fault;
use crate::process::{Pid, Process, ProcessState, ProcessTable, QueueKind};

/// What the scheduler wants the machine to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Switch to this process, now `Running`
    Run(Pid),
    /// Nothing left alive; power off
    Shutdown,
}

#[derive(Debug, Default, Clone, Copy)]
struct Queue {
    head: Option<Pid>,
    tail: Option<Pid>,
    len: usize,
}

/// Scheduler state: the process arena and both queues.
pub struct Scheduler {
    procs: ProcessTable,
    ready: Queue,
    blocked: Queue,
}

impl Scheduler {
    /// Create a scheduler over an empty process table.
    pub fn new() -> Self {
        Self {
            procs: ProcessTable::new(),
            ready: Queue::default(),
            blocked: Queue::default(),
        }
    }

    /// Process table
    pub fn procs(&self) -> &ProcessTable {
        &self.procs
    }

    /// Mutable process table, for register state only.
    pub fn procs_mut(&mut self) -> &mut ProcessTable {
        &mut self.procs
    }

    /// Get a descriptor
    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid)
    }

    /// Append `pid` to the ready queue and mark it `Ready`.
    ///
    /// No-op if it is already queued there; unlinked from the blocked queue
    /// first if it was waiting.
    pub fn insert_ready(&mut self, pid: Pid) {
        self.insert(pid, QueueKind::Ready);
    }

    /// Append `pid` to the blocked queue and mark it `Blocked`.
    pub fn insert_blocked(&mut self, pid: Pid) {
        self.insert(pid, QueueKind::Blocked);
    }

    fn insert(&mut self, pid: Pid, kind: QueueKind) {
        let Some(current) = self.procs.get(pid).map(|p| p.queue) else {
            log::warn!("[SCHED] ignoring enqueue of unknown process {}", pid);
            return;
        };
        if current == Some(kind) {
            return;
        }
        if current.is_some() {
            self.unlink(pid);
        }

        let old_tail = self.queue(kind).tail;
        match old_tail {
            // Empty queue: head is set directly
            None => self.queue_mut(kind).head = Some(pid),
            Some(tail) => {
                if let Some(p) = self.procs.get_mut(tail) {
                    p.queue_next = Some(pid);
                }
            }
        }
        let queue = self.queue_mut(kind);
        queue.tail = Some(pid);
        queue.len += 1;

        if let Some(p) = self.procs.get_mut(pid) {
            p.queue_next = None;
            p.queue = Some(kind);
            p.state = match kind {
                QueueKind::Ready => ProcessState::Ready,
                QueueKind::Blocked => ProcessState::Blocked,
            };
        }

        log::debug!("[SCHED] process {} -> {:?} queue", pid, kind);
    }

    /// Remove `pid` from whichever queue holds it. The state is left for the
    /// caller to set.
    fn unlink(&mut self, pid: Pid) -> bool {
        let Some(kind) = self.procs.get(pid).and_then(|p| p.queue) else {
            return false;
        };

        let mut prev: Option<Pid> = None;
        let mut cursor = self.queue(kind).head;
        while let Some(at) = cursor {
            if at == pid {
                break;
            }
            prev = Some(at);
            cursor = self.next_of(at);
        }
        if cursor.is_none() {
            return false;
        }

        let next = self.next_of(pid);
        match prev {
            None => self.queue_mut(kind).head = next,
            Some(prev) => {
                if let Some(p) = self.procs.get_mut(prev) {
                    p.queue_next = next;
                }
            }
        }
        let queue = self.queue_mut(kind);
        if queue.tail == Some(pid) {
            queue.tail = prev;
        }
        queue.len -= 1;

        if let Some(p) = self.procs.get_mut(pid) {
            p.queue_next = None;
            p.queue = None;
        }
        true
    }

    /// Take the process out of any queue and mark it `Zombie`.
    pub fn retire(&mut self, pid: Pid) {
        self.unlink(pid);
        if let Some(p) = self.procs.get_mut(pid) {
            p.state = ProcessState::Zombie;
            log::debug!("[SCHED] process {} is now a zombie", pid);
        }
    }

    /// Decide what runs next.
    ///
    /// An empty ready queue means shutdown when every descriptor is `Free`
    /// or `Zombie`. Anything else still alive with nothing ready can never
    /// make progress and is fatal.
    pub fn pick_next(&mut self) -> Result<Decision, Fault> {
        #[cfg(feature = "trace-sched")]
        self.show_ready_queue();

        let Some(pid) = self.ready.head else {
            let mut stuck = 0usize;
            for p in self.procs.iter().filter(|p| !p.state.is_terminal()) {
                log::error!(
                    "[SCHED] process {} left in state {:?} with nothing ready",
                    p.pid(),
                    p.state
                );
                stuck += 1;
            }
            if stuck > 0 {
                return Err(Fault::UnhandledBlockedState);
            }
            log::info!("[SCHED] no process left, shutting down");
            return Ok(Decision::Shutdown);
        };

        let state = self.procs.get(pid).map(|p| p.state);
        if state != Some(ProcessState::Ready) {
            log::error!("[SCHED] ready queue head {} is in state {:?}", pid, state);
            return Err(Fault::CorruptReadyQueue(pid));
        }

        self.unlink(pid);
        if let Some(p) = self.procs.get_mut(pid) {
            p.state = ProcessState::Running;
        }
        log::debug!("[SCHED] going to schedule process {} to run", pid);
        Ok(Decision::Run(pid))
    }

    /// Move `pid`'s parent from the blocked queue to the ready queue.
    ///
    /// Silent no-op when there is no parent or it is not blocked.
    pub fn wake_up(&mut self, pid: Pid) {
        let Some(parent) = self.procs.get(pid).and_then(|p| p.parent) else {
            return;
        };

        let mut cursor = self.blocked.head;
        while let Some(at) = cursor {
            if at == parent {
                self.unlink(parent);
                self.insert_ready(parent);
                log::debug!("[SCHED] process {} woke parent {}", pid, parent);
                return;
            }
            cursor = self.next_of(at);
        }
    }

    /// Ready queue length
    pub fn ready_len(&self) -> usize {
        self.ready.len
    }

    /// Blocked queue length
    pub fn blocked_len(&self) -> usize {
        self.blocked.len
    }

    /// Ready queue in FIFO order
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.collect(self.ready.head)
    }

    /// Blocked queue in FIFO order
    pub fn blocked_pids(&self) -> Vec<Pid> {
        self.collect(self.blocked.head)
    }

    /// Dump the ready queue at trace level.
    pub fn show_ready_queue(&self) {
        log::trace!("[SCHED] ready queue: {:?}", self.ready_pids());
    }

    fn collect(&self, head: Option<Pid>) -> Vec<Pid> {
        let mut out = Vec::new();
        let mut cursor = head;
        while let Some(at) = cursor {
            out.push(at);
            cursor = self.next_of(at);
        }
        out
    }

    fn next_of(&self, pid: Pid) -> Option<Pid> {
        self.procs.get(pid).and_then(|p| p.queue_next)
    }

    fn queue(&self, kind: QueueKind) -> &Queue {
        match kind {
            QueueKind::Ready => &self.ready,
            QueueKind::Blocked => &self.blocked,
        }
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut Queue {
        match kind {
            QueueKind::Ready => &mut self.ready,
            QueueKind::Blocked => &mut self.blocked,
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
