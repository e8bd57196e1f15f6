//! Global kernel instance and trap entry glue
//!
//! All kernel-side mutation is serialized by one lock: the trap entry
//! acquires it, the dispatcher runs to completion under it, and it is
//! released on trap exit. On the idle path the release happens before
//! the wait-for-interrupt, so the next tick can get back in.

use crate::hal::machine::MachineHal;
use crate::trap::Kernel;
use lazy_static::lazy_static;
use spin::Mutex;

lazy_static! {
    /// The kernel behind the big kernel lock.
    pub static ref KERNEL: Mutex<Kernel<MachineHal>> = Mutex::new(Kernel::new(MachineHal));
}

/// Architectural trap entry, reached from the trap vector with the
/// register file already parked at the fixed save area.
#[cfg(any(target_arch = "riscv32", target_arch = "riscv64"))]
#[no_mangle]
pub extern "C" fn kernel_entry() {
    use crate::config::SAVED_REGS_ADDR;
    use crate::hal::Hal;
    use crate::trap::{TrapFrame, TrapOutcome};

    let mut kernel = KERNEL.lock();
    // the prologue owns the save area for the duration of the trap
    let frame = unsafe { &mut *(SAVED_REGS_ADDR as *mut TrapFrame) };
    match kernel.handle_trap(frame) {
        TrapOutcome::Resume => {}
        TrapOutcome::Idle => {
            drop(kernel);
            let hal = MachineHal;
            hal.enable_interrupts();
            hal.wait_for_interrupt();
        }
    }
}
