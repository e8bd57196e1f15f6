//! Process table implementation
//!
//! A fixed-capacity array of process control blocks, slot 0 reserved as
//! the placeholder idle cores run on. Pids are assigned from a counter
//! that never wraps back; lookups are linear scans, which is the right
//! trade at sixteen slots.
//!
//! Status setters that take a process out of `Running` settle its CPU
//! accounting first, so the MLFQ policy always sees the runtime a
//! process actually consumed.

pub mod mlfq;
mod pcb;

pub use pcb::{LifecycleStats, Process, ProcStatus};

use crate::config::{Pid, MAX_NPROCESS};

/// The process table: one PCB per slot plus the pid counter.
pub struct ProcTable {
    procs: [Process; MAX_NPROCESS + 1],
    next_pid: Pid,
}

impl ProcTable {
    /// An empty table. Slot 0 stays the idle placeholder forever.
    pub const fn new() -> Self {
        const UNUSED: Process = Process::unused();
        Self {
            procs: [UNUSED; MAX_NPROCESS + 1],
            next_pid: 0,
        }
    }

    /// Shared view of a slot.
    pub fn slot(&self, idx: usize) -> &Process {
        &self.procs[idx]
    }

    /// Exclusive view of a slot.
    pub(crate) fn slot_mut(&mut self, idx: usize) -> &mut Process {
        &mut self.procs[idx]
    }

    /// Slot index holding `pid`, if it is live.
    pub fn slot_of(&self, pid: Pid) -> Option<usize> {
        (1..=MAX_NPROCESS)
            .find(|&i| self.procs[i].pid == pid && self.procs[i].status != ProcStatus::Unused)
    }

    /// Claim the first unused slot for a new process.
    ///
    /// The new PCB starts at MLFQ level 0 with all accounting zeroed and
    /// status `Loading`. Running out of slots is a misconfigured system,
    /// not a runtime condition, and halts the kernel.
    pub fn alloc(&mut self, now: u64) -> Pid {
        for i in 1..=MAX_NPROCESS {
            if self.procs[i].status == ProcStatus::Unused {
                self.next_pid += 1;
                let p = &mut self.procs[i];
                *p = Process::unused();
                p.pid = self.next_pid;
                p.status = ProcStatus::Loading;
                p.creation_time_us = now;
                trace!("P[{}] allocated in slot {i}", p.pid);
                return p.pid;
            }
        }
        panic!("proc table: reached the limit of {} processes", MAX_NPROCESS);
    }

    /// Mark `pid`'s image as installed; it becomes eligible for selection.
    pub fn set_ready(&mut self, pid: Pid) {
        if let Some(i) = self.slot_of(pid) {
            self.procs[i].status = ProcStatus::Ready;
        }
    }

    /// Select `pid`: stamp the scheduling clocks and mark it `Running`.
    pub fn set_running(&mut self, pid: Pid, now: u64) {
        if let Some(i) = self.slot_of(pid) {
            let p = &mut self.procs[i];
            if p.first_scheduled_us == 0 {
                p.first_scheduled_us = now;
            }
            p.last_scheduled_us = now;
            p.status = ProcStatus::Running;
        }
    }

    /// Preempt `pid`: settle its CPU accounting and mark it `Runnable`.
    pub fn set_runnable(&mut self, pid: Pid, now: u64) {
        if let Some(i) = self.slot_of(pid) {
            let p = &mut self.procs[i];
            p.flush_cpu_accounting(now);
            p.status = ProcStatus::Runnable;
        }
    }

    /// Block `pid` on its syscall: settle accounting, mark `PendingSyscall`.
    pub fn set_pending(&mut self, pid: Pid, now: u64) {
        if let Some(i) = self.slot_of(pid) {
            let p = &mut self.procs[i];
            p.flush_cpu_accounting(now);
            p.status = ProcStatus::PendingSyscall;
        }
    }

    /// Put `pid` to sleep until `now + usec`; the scheduler wakes it on
    /// the first pass at or after the deadline.
    pub fn sleep(&mut self, pid: Pid, usec: u64, now: u64) {
        if let Some(i) = self.slot_of(pid) {
            let p = &mut self.procs[i];
            p.flush_cpu_accounting(now);
            p.wakeup_time_us = now + usec;
            p.status = ProcStatus::PendingSyscall;
        }
    }

    /// Tear down the process in `slot`: record its termination time,
    /// compute the lifecycle report and free the slot. The caller prints
    /// the report and releases platform resources.
    pub(crate) fn release(&mut self, slot: usize, now: u64) -> LifecycleStats {
        let p = &mut self.procs[slot];
        p.flush_cpu_accounting(now);
        p.termination_time_us = now;
        let stats = LifecycleStats::compute(p);
        p.status = ProcStatus::Unused;
        stats
    }
}
