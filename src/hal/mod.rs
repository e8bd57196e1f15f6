//! Hardware abstraction layer
//!
//! The kernel core never touches a CSR or an MMIO register directly.
//! The monotonic clock, the preemption timer, address translation, the
//! TTY and the handful of trap CSRs are all reached through the [`Hal`]
//! trait. [`machine::MachineHal`] implements it for a RISC-V
//! machine-mode environment; tests drive the dispatcher with a
//! recording mock instead.

pub mod machine;

use crate::config::Pid;

/// Privilege mode a process returns to when its trap exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// user applications
    User,
    /// kernel processes
    Machine,
}

/// Platform surface consumed by the kernel core.
///
/// `mmu_translate` returns a physical address valid for direct access
/// while the kernel lock is held; the MMU itself (page-table layout,
/// allocation) belongs to the platform, not to this crate.
pub trait Hal {
    /// Monotonic non-decreasing microseconds since boot.
    fn now_us(&self) -> u64;
    /// Id of the hardware thread executing the current trap.
    fn hart_id(&self) -> usize;
    /// Arm this core's preemption timer for the next tick.
    fn timer_reset(&self, core: usize);
    /// Physical address of `vaddr` in `pid`'s address space.
    fn mmu_translate(&self, pid: Pid, vaddr: usize) -> usize;
    /// Install `pid`'s page tables on the current core.
    fn mmu_switch(&self, pid: Pid);
    /// Flush the translation cache after a switch.
    fn mmu_flush_cache(&self);
    /// Release `pid`'s page tables.
    fn mmu_free(&self, pid: Pid);
    /// True iff the TTY input ring is empty.
    fn tty_input_empty(&self) -> bool;
    /// Write a string to the console.
    fn tty_write(&self, s: &str);
    /// Raw trap cause word; the top bit distinguishes interrupt from exception.
    fn read_cause(&self) -> usize;
    /// Program counter at trap entry.
    fn read_epc(&self) -> usize;
    /// Program counter restored on trap exit.
    fn write_epc(&self, epc: usize);
    /// Configure the privilege mode entered on trap exit.
    fn set_mode(&self, mode: Mode);
    /// Enable interrupt delivery on the current core.
    fn enable_interrupts(&self);
    /// Stall the current core until the next interrupt.
    fn wait_for_interrupt(&self);
}

#[cfg(test)]
pub(crate) mod mock {
    //! A recording HAL for driving the dispatcher on the host.

    use super::{Hal, Mode};
    use crate::config::{Pid, SYSCALL_ARG};
    use crate::syscall::SyscallFrame;
    use core::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    pub(crate) struct MockHal {
        pub now: Cell<u64>,
        pub hart: Cell<usize>,
        pub cause: Cell<usize>,
        pub epc: Cell<usize>,
        pub mode: Cell<Option<Mode>>,
        pub tty_pending: Cell<bool>,
        pub timer_resets: RefCell<Vec<usize>>,
        pub mmu_switches: RefCell<Vec<Pid>>,
        pub mmu_frees: RefCell<Vec<Pid>>,
        pub flushes: Cell<usize>,
        pub console: RefCell<String>,
        syscall_pages: RefCell<BTreeMap<Pid, Box<SyscallFrame>>>,
    }

    impl MockHal {
        pub fn new() -> Self {
            Self {
                now: Cell::new(0),
                hart: Cell::new(0),
                cause: Cell::new(0),
                epc: Cell::new(0),
                mode: Cell::new(None),
                tty_pending: Cell::new(false),
                timer_resets: RefCell::new(Vec::new()),
                mmu_switches: RefCell::new(Vec::new()),
                mmu_frees: RefCell::new(Vec::new()),
                flushes: Cell::new(0),
                console: RefCell::new(String::new()),
                syscall_pages: RefCell::new(BTreeMap::new()),
            }
        }

        pub fn advance(&self, us: u64) {
            self.now.set(self.now.get() + us);
        }

        /// Pointer to the per-pid syscall page, creating it on first use.
        /// Box keeps the address stable across later insertions.
        pub fn syscall_page(&self, pid: Pid) -> *mut SyscallFrame {
            let mut pages = self.syscall_pages.borrow_mut();
            let frame = pages
                .entry(pid)
                .or_insert_with(|| Box::new(SyscallFrame::zeroed()));
            &mut **frame as *mut SyscallFrame
        }

        /// Stage a syscall frame on `pid`'s page, as the user library would.
        pub fn stage_syscall(&self, pid: Pid, frame: SyscallFrame) {
            unsafe { self.syscall_page(pid).write(frame) };
        }

        /// Read back `pid`'s syscall page, as user space would after a recv.
        pub fn user_frame(&self, pid: Pid) -> SyscallFrame {
            unsafe { self.syscall_page(pid).read() }
        }
    }

    impl Hal for MockHal {
        fn now_us(&self) -> u64 {
            self.now.get()
        }
        fn hart_id(&self) -> usize {
            self.hart.get()
        }
        fn timer_reset(&self, core: usize) {
            self.timer_resets.borrow_mut().push(core);
        }
        fn mmu_translate(&self, pid: Pid, vaddr: usize) -> usize {
            assert_eq!(vaddr, SYSCALL_ARG, "mock only maps the syscall page");
            self.syscall_page(pid) as usize
        }
        fn mmu_switch(&self, pid: Pid) {
            self.mmu_switches.borrow_mut().push(pid);
        }
        fn mmu_flush_cache(&self) {
            self.flushes.set(self.flushes.get() + 1);
        }
        fn mmu_free(&self, pid: Pid) {
            self.mmu_frees.borrow_mut().push(pid);
        }
        fn tty_input_empty(&self) -> bool {
            !self.tty_pending.get()
        }
        fn tty_write(&self, s: &str) {
            self.console.borrow_mut().push_str(s);
        }
        fn read_cause(&self) -> usize {
            self.cause.get()
        }
        fn read_epc(&self) -> usize {
            self.epc.get()
        }
        fn write_epc(&self, epc: usize) {
            self.epc.set(epc);
        }
        fn set_mode(&self, mode: Mode) {
            self.mode.set(Some(mode));
        }
        fn enable_interrupts(&self) {}
        fn wait_for_interrupt(&self) {}
    }
}
