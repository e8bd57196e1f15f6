//! Constants in the kernel

/// Process identifier. Positive for live processes, `0` for the idle
/// placeholder, negative values are sentinels.
pub type Pid = i32;

/// capacity of the process table (slot 0 is the idle placeholder)
pub const MAX_NPROCESS: usize = 16;
/// number of hardware threads the kernel schedules on
pub const NCORES: usize = 4;
/// number of general-purpose registers saved at trap entry
pub const NSAVED_REGS: usize = 32;

/// number of MLFQ levels; level 0 is highest priority
pub const MLFQ_LEVELS: usize = 5;
/// runtime quantum of MLFQ level 0 (microseconds); level `l` gets `(l + 1)` times this
pub const BASE_QUANTUM_US: u64 = 100_000;
/// period of the global MLFQ priority boost (microseconds)
pub const RESET_PERIOD_US: u64 = 10_000_000;
/// response times above this are treated as clock anomalies and substituted
pub const RESPONSE_CAP_US: u64 = 10_000_000;
/// preemption timer tick period (microseconds)
pub const TIMER_TICK_US: u64 = 10_000;

/// byte length of an IPC message payload
pub const MSG_LEN: usize = 1024;

/// pid of the idle placeholder in slot 0
pub const PID_IDLE: Pid = 0;
/// sentinel pid: free every user process / receive from any sender
pub const PID_ALL: Pid = -1;
/// sentinel sender filter for receive-from-anyone
pub const PID_ANY: Pid = PID_ALL;
/// pid of the shell process (interactivity boost target)
pub const SHELL_PID: Pid = 4;
/// first user-application pid; smaller pids are kernel processes
pub const USER_START: Pid = 5;

/// entry point of a newly loaded application
pub const APPS_ENTRY: usize = 0x8040_0000;
/// virtual address of the argc/argv block handed to a new application
pub const APPS_ARG: usize = 0x8040_1000;
/// fixed virtual address of the user-space syscall argument block
pub const SYSCALL_ARG: usize = 0x8040_2000;

/// top of the kernel stack region
pub const KERNEL_STACK_TOP: usize = 0x8020_0000;
/// fixed address of the register save area written by the trap prologue
pub const SAVED_REGS_ADDR: usize = KERNEL_STACK_TOP - NSAVED_REGS * core::mem::size_of::<usize>();
