//! RISC-V machine-mode implementation of the HAL
//!
//! Talks to the CLINT for timekeeping and preemption, the NS16550 UART
//! for the console, and the machine CSRs for trap state. The kernel runs
//! flat-mapped on this platform, so the MMU operations are identity;
//! a platform with paging substitutes its own [`Hal`] implementation.

use super::{Hal, Mode};
use crate::config::{Pid, TIMER_TICK_US};

/// Machine-mode HAL. Stateless: every operation reads the hardware.
pub struct MachineHal;

impl Hal for MachineHal {
    fn now_us(&self) -> u64 {
        platform::mtime() / platform::TICKS_PER_US
    }

    fn hart_id(&self) -> usize {
        platform::hart_id()
    }

    fn timer_reset(&self, core: usize) {
        platform::set_mtimecmp(core, platform::mtime() + TIMER_TICK_US * platform::TICKS_PER_US);
    }

    fn mmu_translate(&self, _pid: Pid, vaddr: usize) -> usize {
        vaddr
    }

    fn mmu_switch(&self, _pid: Pid) {}

    fn mmu_flush_cache(&self) {
        platform::fence_i();
    }

    fn mmu_free(&self, _pid: Pid) {}

    fn tty_input_empty(&self) -> bool {
        platform::uart_rx_empty()
    }

    fn tty_write(&self, s: &str) {
        for byte in s.bytes() {
            platform::uart_putchar(byte);
        }
    }

    fn read_cause(&self) -> usize {
        platform::read_mcause()
    }

    fn read_epc(&self) -> usize {
        platform::read_mepc()
    }

    fn write_epc(&self, epc: usize) {
        platform::write_mepc(epc);
    }

    fn set_mode(&self, mode: Mode) {
        platform::set_mpp(mode);
    }

    fn enable_interrupts(&self) {
        platform::enable_timer_interrupts();
    }

    fn wait_for_interrupt(&self) {
        platform::wfi();
    }
}

#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
mod platform {
    use super::Mode;
    use riscv::register::{mcause, mepc, mhartid, mie, mstatus};

    /// CLINT ticks per microsecond (10 MHz timebase).
    pub(super) const TICKS_PER_US: u64 = 10;

    const CLINT_BASE: usize = 0x200_0000;
    const CLINT_MTIMECMP: usize = CLINT_BASE + 0x4000;
    const CLINT_MTIME: usize = CLINT_BASE + 0xbff8;

    const UART_BASE: usize = 0x1000_0000;
    const UART_THR: usize = UART_BASE;
    const UART_LSR: usize = UART_BASE + 5;
    const LSR_RX_READY: u8 = 1 << 0;
    const LSR_TX_IDLE: u8 = 1 << 5;

    #[cfg(target_arch = "riscv64")]
    pub(super) fn mtime() -> u64 {
        unsafe { (CLINT_MTIME as *const u64).read_volatile() }
    }

    #[cfg(target_arch = "riscv32")]
    pub(super) fn mtime() -> u64 {
        // 64-bit counter read as two words; retry if it carried between reads.
        loop {
            let hi = unsafe { ((CLINT_MTIME + 4) as *const u32).read_volatile() };
            let lo = unsafe { (CLINT_MTIME as *const u32).read_volatile() };
            let hi2 = unsafe { ((CLINT_MTIME + 4) as *const u32).read_volatile() };
            if hi == hi2 {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
        }
    }

    #[cfg(target_arch = "riscv64")]
    pub(super) fn set_mtimecmp(hart: usize, deadline: u64) {
        let reg = (CLINT_MTIMECMP + hart * 8) as *mut u64;
        unsafe { reg.write_volatile(deadline) };
    }

    #[cfg(target_arch = "riscv32")]
    pub(super) fn set_mtimecmp(hart: usize, deadline: u64) {
        let lo = (CLINT_MTIMECMP + hart * 8) as *mut u32;
        let hi = (CLINT_MTIMECMP + hart * 8 + 4) as *mut u32;
        // No spurious interrupt while the two halves are inconsistent.
        unsafe {
            lo.write_volatile(u32::MAX);
            hi.write_volatile((deadline >> 32) as u32);
            lo.write_volatile(deadline as u32);
        }
    }

    pub(super) fn hart_id() -> usize {
        mhartid::read()
    }

    pub(super) fn read_mcause() -> usize {
        mcause::read().bits()
    }

    pub(super) fn read_mepc() -> usize {
        mepc::read()
    }

    pub(super) fn write_mepc(epc: usize) {
        unsafe { mepc::write(epc) };
    }

    pub(super) fn set_mpp(mode: Mode) {
        unsafe {
            mstatus::set_mpp(match mode {
                Mode::User => mstatus::MPP::User,
                Mode::Machine => mstatus::MPP::Machine,
            });
        }
    }

    pub(super) fn enable_timer_interrupts() {
        unsafe {
            mie::set_mtimer();
            mstatus::set_mie();
        }
    }

    pub(super) fn wfi() {
        unsafe { riscv::asm::wfi() };
    }

    pub(super) fn fence_i() {
        unsafe { core::arch::asm!("fence.i") };
    }

    pub(super) fn uart_rx_empty() -> bool {
        let lsr = unsafe { (UART_LSR as *const u8).read_volatile() };
        lsr & LSR_RX_READY == 0
    }

    pub(super) fn uart_putchar(byte: u8) {
        unsafe {
            while (UART_LSR as *const u8).read_volatile() & LSR_TX_IDLE == 0 {}
            (UART_THR as *mut u8).write_volatile(byte);
        }
    }
}

#[cfg(not(any(target_arch = "riscv32", target_arch = "riscv64")))]
mod platform {
    //! Hosted stand-ins so the crate links on non-RISC-V targets; the
    //! machine HAL is only meaningful on the real hardware.

    use super::Mode;

    pub(super) const TICKS_PER_US: u64 = 10;

    pub(super) fn mtime() -> u64 {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn set_mtimecmp(_hart: usize, _deadline: u64) {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn hart_id() -> usize {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn read_mcause() -> usize {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn read_mepc() -> usize {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn write_mepc(_epc: usize) {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn set_mpp(_mode: Mode) {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn enable_timer_interrupts() {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn wfi() {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn fence_i() {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn uart_rx_empty() -> bool {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
    pub(super) fn uart_putchar(_byte: u8) {
        unimplemented!("MachineHal requires a RISC-V machine")
    }
}
