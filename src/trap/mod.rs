//! Trap dispatcher and scheduler loop
//!
//! Every kernel entry lands here: the trap prologue grabs the global
//! kernel lock, snapshots the register file at the fixed save area and
//! calls [`Kernel::handle_trap`]. The dispatcher saves context into the
//! current PCB, routes the cause (timer preemption, `ecall`, or a
//! fault), and then runs scheduler selection: wake expired sleepers,
//! retry pending syscalls, pick the runnable process on the best MLFQ
//! level, install its address space and privilege mode, and re-arm the
//! preemption timer. Context restore happens on the way out.
//!
//! A [`TrapOutcome::Idle`] return means no process was runnable; the
//! caller must release the kernel lock *before* enabling interrupts and
//! waiting, or the next timer tick could never get back in.

mod context;

pub use context::TrapFrame;

use crate::config::{
    Pid, APPS_ENTRY, MAX_NPROCESS, MLFQ_LEVELS, NCORES, PID_ALL, SYSCALL_ARG, USER_START,
};
use crate::console::Console;
use crate::hal::{Hal, Mode};
use crate::process::mlfq::Mlfq;
use crate::process::{ProcStatus, ProcTable};
use crate::syscall::{self, Syscall, SyscallFrame, SyscallKind, SyscallStatus};
use crate::uaccess::UserPtr;
use core::fmt::Write;

/// Top bit of the cause word: interrupt when set, exception when clear.
const INTERRUPT_BIT: usize = 1 << (usize::BITS - 1);
/// Low bits of the cause word carrying the interrupt/exception id.
const CAUSE_CODE_MASK: usize = 0x3ff;
/// Machine timer interrupt.
const INTR_TIMER: usize = 7;
/// Environment call from user mode.
const EXCP_ECALL_U: usize = 8;
/// Environment call from machine mode.
const EXCP_ECALL_M: usize = 11;
/// Width of the `ecall` instruction; the saved pc must step past it.
const ECALL_INSN_LEN: usize = 4;

/// How a trap exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapOutcome {
    /// a process was installed; return from trap into it
    Resume,
    /// nothing runnable; release the lock, enable interrupts and wait
    Idle,
}

/// The kernel core: process table, per-core map, MLFQ bookkeeping and
/// the platform handle, mutated only under the global kernel lock.
pub struct Kernel<H: Hal> {
    hal: H,
    procs: ProcTable,
    mlfq: Mlfq,
    core_to_slot: [usize; NCORES],
}

impl<H: Hal> Kernel<H> {
    /// Kernel state at boot: empty table, every core idle.
    pub const fn new(hal: H) -> Self {
        Self {
            hal,
            procs: ProcTable::new(),
            mlfq: Mlfq::new(),
            core_to_slot: [0; NCORES],
        }
    }

    /// The platform handle.
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// The process table (read-only; mutation goes through operations).
    pub fn procs(&self) -> &ProcTable {
        &self.procs
    }

    /// Allocate a PCB for a process being loaded.
    pub fn proc_alloc(&mut self) -> Pid {
        self.procs.alloc(self.hal.now_us())
    }

    /// Mark `pid`'s image installed and eligible for selection.
    pub fn proc_set_ready(&mut self, pid: Pid) {
        self.procs.set_ready(pid);
    }

    /// Terminate `pid`, or every user process when given
    /// [`PID_ALL`](crate::config::PID_ALL). Prints the lifecycle report
    /// and releases the address space of each process torn down.
    pub fn proc_free(&mut self, pid: Pid) {
        let now = self.hal.now_us();
        if pid == PID_ALL {
            for i in 1..=MAX_NPROCESS {
                let p = self.procs.slot(i);
                if p.status != ProcStatus::Unused && p.is_user() {
                    self.free_slot(i, now);
                }
            }
        } else if let Some(i) = self.procs.slot_of(pid) {
            self.free_slot(i, now);
        }
    }

    /// Block `pid` until `usec` microseconds from now.
    pub fn proc_sleep(&mut self, pid: Pid, usec: u64) {
        let now = self.hal.now_us();
        self.procs.sleep(pid, usec, now);
    }

    /// Print one line per core: the running pid or idle.
    pub fn cores_info(&self) {
        let mut con = Console(&self.hal);
        let _ = writeln!(con, "Core information:");
        for core in 0..NCORES {
            let slot = self.core_to_slot[core];
            let p = self.procs.slot(slot);
            if slot > 0 && p.status == ProcStatus::Running {
                let _ = writeln!(con, "  Core {}: Process {}", core, p.pid);
            } else {
                let _ = writeln!(con, "  Core {}: Idle", core);
            }
        }
    }

    fn free_slot(&mut self, slot: usize, now: u64) {
        let pid = self.procs.slot(slot).pid;
        let stats = self.procs.release(slot, now);
        let mut con = Console(&self.hal);
        let _ = write!(con, "{}", stats);
        self.hal.mmu_free(pid);
    }

    /// Handle one trap. Called with the kernel lock held and the register
    /// file of the interrupted context in `frame`; on return `frame` and
    /// the saved pc hold the context to resume.
    pub fn handle_trap(&mut self, frame: &mut TrapFrame) -> TrapOutcome {
        let core = self.hal.hart_id();

        // context save into the current PCB (slot 0 when the core was idle)
        let slot = self.core_to_slot[core];
        {
            let p = self.procs.slot_mut(slot);
            p.saved_pc = self.hal.read_epc();
            p.saved_regs = *frame;
        }

        let cause = self.hal.read_cause();
        let outcome = if cause & INTERRUPT_BIT != 0 {
            self.handle_interrupt(core, cause & CAUSE_CODE_MASK)
        } else {
            self.handle_exception(core, cause)
        };

        // context restore from whichever PCB won selection
        let slot = self.core_to_slot[core];
        let p = self.procs.slot(slot);
        *frame = p.saved_regs;
        self.hal.write_epc(p.saved_pc);

        outcome
    }

    fn handle_interrupt(&mut self, core: usize, code: usize) -> TrapOutcome {
        if code != INTR_TIMER {
            panic!("kernel got interrupt {}", code);
        }

        let slot = self.core_to_slot[core];
        if slot > 0 {
            let now = self.hal.now_us();
            let p = self.procs.slot_mut(slot);
            p.timer_tick_count += 1;
            p.flush_cpu_accounting(now);
        }
        self.schedule(core)
    }

    fn handle_exception(&mut self, core: usize, code: usize) -> TrapOutcome {
        if (EXCP_ECALL_U..=EXCP_ECALL_M).contains(&code) {
            self.handle_ecall(core);
            return self.schedule(core);
        }

        let slot = self.core_to_slot[core];
        let p = self.procs.slot(slot);
        let pid = p.pid;
        if p.is_user() {
            warn!("P[{pid}] faulted with exception {code}");
            let mut con = Console(&self.hal);
            let _ = writeln!(con, "Process {} killed due to exception {}", pid, code);
            self.proc_free(pid);
            return self.schedule(core);
        }
        panic!("kernel got exception {}", code);
    }

    /// Copy the caller's syscall argument block into its PCB and make
    /// whatever immediate progress the record allows.
    fn handle_ecall(&mut self, core: usize) {
        let now = self.hal.now_us();
        let slot = self.core_to_slot[core];
        let pid = self.procs.slot(slot).pid;

        let user = unsafe { UserPtr::<SyscallFrame>::new(&self.hal, pid, SYSCALL_ARG).read() };
        let record = Syscall::from_frame(&user);
        trace!("P[{pid}] ecall {:?}", record.kind);

        {
            let p = self.procs.slot_mut(slot);
            p.syscall = record;
            p.saved_pc += ECALL_INSN_LEN;
        }
        self.procs.set_pending(pid, now);

        if record.kind == SyscallKind::Sleep {
            let usec = record.sleep_usec();
            let p = self.procs.slot_mut(slot);
            p.syscall.status = SyscallStatus::Done;
            p.wakeup_time_us = now + usec;
        }

        syscall::try_syscall(&self.hal, &mut self.procs, slot, now);
    }

    /// Scheduler selection: give up the current process, boost if due,
    /// then pick the best runnable slot and install it.
    fn schedule(&mut self, core: usize) -> TrapOutcome {
        let now = self.hal.now_us();

        let slot = self.core_to_slot[core];
        if self.procs.slot(slot).status == ProcStatus::Running {
            let pid = self.procs.slot(slot).pid;
            self.procs.set_runnable(pid, now);
        }

        let tty_pending = !self.hal.tty_input_empty();
        self.mlfq.maybe_reset(&mut self.procs, now, tty_pending);

        // First pass: wake expired sleepers, retry pending syscalls, and
        // track the eligible slot on the best level (ties to the lowest
        // slot index).
        let mut next = None;
        let mut min_level = MLFQ_LEVELS;
        for i in 1..=MAX_NPROCESS {
            {
                let p = self.procs.slot_mut(i);
                if p.status == ProcStatus::PendingSyscall
                    && p.wakeup_time_us > 0
                    && now >= p.wakeup_time_us
                {
                    p.wakeup_time_us = 0;
                    p.status = ProcStatus::Runnable;
                }
            }
            if self.procs.slot(i).status == ProcStatus::PendingSyscall {
                syscall::try_syscall(&self.hal, &mut self.procs, i, now);
            }
            let p = self.procs.slot(i);
            if p.wakeup_time_us > 0 && now < p.wakeup_time_us {
                continue;
            }
            if matches!(p.status, ProcStatus::Ready | ProcStatus::Runnable)
                && p.queue_level < min_level
            {
                min_level = p.queue_level;
                next = Some(i);
            }
        }

        // Second pass, without the MLFQ filter. Under the table invariants
        // it cannot find anything the first pass missed; kept as a
        // fallback.
        if next.is_none() {
            for i in 1..=MAX_NPROCESS {
                if self.procs.slot(i).status == ProcStatus::PendingSyscall {
                    syscall::try_syscall(&self.hal, &mut self.procs, i, now);
                }
                let p = self.procs.slot(i);
                if p.wakeup_time_us > 0 && now < p.wakeup_time_us {
                    continue;
                }
                if matches!(p.status, ProcStatus::Ready | ProcStatus::Runnable) {
                    next = Some(i);
                    break;
                }
            }
        }

        let Some(next) = next else {
            trace!("core {core} idle");
            self.core_to_slot[core] = 0;
            self.hal.timer_reset(core);
            return TrapOutcome::Idle;
        };

        self.core_to_slot[core] = next;
        let winner = self.procs.slot(next);
        let pid = winner.pid;
        let first_selection = winner.status == ProcStatus::Ready;

        self.hal.set_mode(if pid >= USER_START {
            Mode::User
        } else {
            Mode::Machine
        });
        self.hal.mmu_switch(pid);
        self.hal.mmu_flush_cache();

        if first_selection {
            // hand a freshly loaded process its argc/argv and entry point
            let p = self.procs.slot_mut(next);
            p.saved_regs = TrapFrame::app_init_context();
            p.saved_pc = APPS_ENTRY;
        }

        self.procs.set_running(pid, self.hal.now_us());
        self.hal.timer_reset(core);
        TrapOutcome::Resume
    }
}
