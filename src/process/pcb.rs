//! Types related to process management

use super::mlfq;
use crate::config::{Pid, RESPONSE_CAP_US, USER_START};
use crate::syscall::Syscall;
use crate::trap::TrapFrame;
use core::fmt;

/// The status of a process in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcStatus {
    /// slot is free
    Unused,
    /// allocated, image not yet installed
    Loading,
    /// image installed, never scheduled
    Ready,
    /// executing on some core
    Running,
    /// preempted, eligible for selection
    Runnable,
    /// blocked on an in-kernel syscall (or sleeping)
    PendingSyscall,
}

/// The process control block.
///
/// One fixed-size record per table slot; all cross-process references are
/// by pid, resolved by table scan, so the PCB stays a plain value type.
#[derive(Debug, Clone, Copy)]
pub struct Process {
    /// stable positive identifier; 0 is the idle placeholder
    pub pid: Pid,
    /// lifecycle status
    pub status: ProcStatus,
    /// program counter at trap entry, restored on exit
    pub saved_pc: usize,
    /// register file snapshot taken at trap entry
    pub saved_regs: TrapFrame,
    /// current in-kernel syscall record
    pub syscall: Syscall,
    /// MLFQ level, 0 = highest priority
    pub queue_level: usize,
    /// runtime accrued at the current level (microseconds)
    pub queue_time_us: u64,
    /// 0 if not sleeping, else earliest wake instant
    pub wakeup_time_us: u64,
    /// when the slot was allocated
    pub creation_time_us: u64,
    /// first time the process was selected; 0 until then
    pub first_scheduled_us: u64,
    /// last time the process was selected
    pub last_scheduled_us: u64,
    /// total CPU time consumed
    pub total_cpu_us: u64,
    /// when the process terminated; 0 while alive
    pub termination_time_us: u64,
    /// timer interrupts taken while current
    pub timer_tick_count: u32,
}

impl Process {
    /// An empty table slot.
    pub const fn unused() -> Self {
        Self {
            pid: 0,
            status: ProcStatus::Unused,
            saved_pc: 0,
            saved_regs: TrapFrame::zeroed(),
            syscall: Syscall::unused(),
            queue_level: 0,
            queue_time_us: 0,
            wakeup_time_us: 0,
            creation_time_us: 0,
            first_scheduled_us: 0,
            last_scheduled_us: 0,
            total_cpu_us: 0,
            termination_time_us: 0,
            timer_tick_count: 0,
        }
    }

    /// True for user applications, false for kernel processes.
    pub fn is_user(&self) -> bool {
        self.pid >= USER_START
    }

    /// Settle CPU accounting for a process leaving (or interrupted in)
    /// the `Running` state: accrue the runtime since it was last
    /// scheduled, feed it to the MLFQ policy, and restart the interval.
    pub fn flush_cpu_accounting(&mut self, now: u64) {
        if self.status != ProcStatus::Running || self.last_scheduled_us == 0 {
            return;
        }
        let delta = now.saturating_sub(self.last_scheduled_us);
        self.total_cpu_us += delta;
        mlfq::account(self, delta);
        self.last_scheduled_us = now;
    }
}

/// Derived lifecycle metrics reported when a process terminates.
///
/// All times are integer milliseconds, rounded toward zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleStats {
    /// pid of the terminated process
    pub pid: Pid,
    /// creation to termination
    pub turnaround_ms: u64,
    /// creation to first selection
    pub response_ms: u64,
    /// total CPU time consumed
    pub cpu_ms: u64,
    /// turnaround minus response minus CPU time
    pub waiting_ms: u64,
    /// timer interrupts taken
    pub timer_ticks: u32,
    /// MLFQ level at termination
    pub queue_level: usize,
}

impl LifecycleStats {
    /// Compute the metrics for a process whose `termination_time_us` has
    /// been recorded. Clock-derived values are clamped non-negative, and
    /// implausible response times are substituted with half the
    /// turnaround.
    pub fn compute(p: &Process) -> Self {
        let turnaround = p.termination_time_us.saturating_sub(p.creation_time_us);
        let mut response = p.first_scheduled_us.saturating_sub(p.creation_time_us);
        if response > turnaround || response > RESPONSE_CAP_US {
            response = turnaround / 2;
        }
        let waiting = turnaround.saturating_sub(response + p.total_cpu_us);

        Self {
            pid: p.pid,
            turnaround_ms: turnaround / 1000,
            response_ms: response / 1000,
            cpu_ms: p.total_cpu_us / 1000,
            waiting_ms: waiting / 1000,
            timer_ticks: p.timer_tick_count,
            queue_level: p.queue_level,
        }
    }
}

impl fmt::Display for LifecycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Process {} terminated:", self.pid)?;
        writeln!(f, "  Turnaround time: {} ms", self.turnaround_ms)?;
        writeln!(f, "  Response time: {} ms", self.response_ms)?;
        writeln!(f, "  Total CPU time: {} ms", self.cpu_ms)?;
        writeln!(f, "  Waiting time: {} ms", self.waiting_ms)?;
        writeln!(f, "  Timer interrupts: {}", self.timer_ticks)?;
        writeln!(f, "  Final queue level: {}", self.queue_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminated(creation: u64, first: u64, cpu: u64, termination: u64) -> Process {
        let mut p = Process::unused();
        p.pid = 6;
        p.creation_time_us = creation;
        p.first_scheduled_us = first;
        p.total_cpu_us = cpu;
        p.termination_time_us = termination;
        p
    }

    #[test]
    fn stats_for_an_ordinary_run() {
        // created at 1s, first ran at 1.2s, used 300ms CPU, died at 2s
        let p = terminated(1_000_000, 1_200_000, 300_000, 2_000_000);
        let stats = LifecycleStats::compute(&p);
        assert_eq!(stats.turnaround_ms, 1000);
        assert_eq!(stats.response_ms, 200);
        assert_eq!(stats.cpu_ms, 300);
        assert_eq!(stats.waiting_ms, 500);
    }

    #[test]
    fn never_scheduled_process_has_zero_response() {
        let p = terminated(1_000_000, 0, 0, 1_400_000);
        let stats = LifecycleStats::compute(&p);
        assert_eq!(stats.response_ms, 0);
        assert_eq!(stats.waiting_ms, 400);
    }

    #[test]
    fn implausible_response_is_substituted() {
        // response above the sanity cap
        let p = terminated(1_000_000, 13_000_000, 0, 21_000_000);
        let stats = LifecycleStats::compute(&p);
        assert_eq!(stats.turnaround_ms, 20_000);
        assert_eq!(stats.response_ms, 10_000);

        // first-selection timestamp after termination
        let p = terminated(1_000_000, 3_000_000, 0, 2_000_000);
        let stats = LifecycleStats::compute(&p);
        assert_eq!(stats.response_ms, stats.turnaround_ms / 2);
    }

    #[test]
    fn waiting_time_is_clamped_non_negative() {
        // accounted CPU exceeds turnaround (clock skew)
        let p = terminated(1_000_000, 1_000_000, 5_000_000, 2_000_000);
        let stats = LifecycleStats::compute(&p);
        assert_eq!(stats.waiting_ms, 0);
    }

    #[test]
    fn stats_block_format() {
        let mut p = terminated(0, 100_000, 200_000, 1_000_000);
        p.timer_tick_count = 17;
        p.queue_level = 3;
        let rendered = format!("{}", LifecycleStats::compute(&p));
        assert_eq!(
            rendered,
            "Process 6 terminated:\n\
             \x20 Turnaround time: 1000 ms\n\
             \x20 Response time: 100 ms\n\
             \x20 Total CPU time: 200 ms\n\
             \x20 Waiting time: 700 ms\n\
             \x20 Timer interrupts: 17\n\
             \x20 Final queue level: 3\n"
        );
    }

    #[test]
    fn accounting_flush_only_applies_to_running() {
        let mut p = Process::unused();
        p.status = ProcStatus::Runnable;
        p.last_scheduled_us = 1_000_000;
        p.flush_cpu_accounting(1_050_000);
        assert_eq!(p.total_cpu_us, 0);

        p.status = ProcStatus::Running;
        p.flush_cpu_accounting(1_050_000);
        assert_eq!(p.total_cpu_us, 50_000);
        assert_eq!(p.last_scheduled_us, 1_050_000);

        // a second flush at the same instant accrues nothing
        p.flush_cpu_accounting(1_050_000);
        assert_eq!(p.total_cpu_us, 50_000);
    }
}
