//! Register-file snapshot carried across a trap
//!
//! The trap prologue stores the 32 general-purpose registers at a fixed
//! save area; the dispatcher copies them into the current PCB on entry
//! and back out for the winner on exit. The layout must match the
//! prologue exactly.

use crate::config::{APPS_ARG, NSAVED_REGS};

/// General-purpose register snapshot, x0-x31 in order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    /// saved register values
    pub regs: [usize; NSAVED_REGS],
}

impl TrapFrame {
    /// An all-zero frame.
    pub const fn zeroed() -> Self {
        Self {
            regs: [0; NSAVED_REGS],
        }
    }

    /// Initial frame of a newly loaded application: the first two slots
    /// carry the argc/argv handoff addresses.
    pub fn app_init_context() -> Self {
        let mut frame = Self::zeroed();
        frame.regs[0] = APPS_ARG;
        frame.regs[1] = APPS_ARG + core::mem::size_of::<u32>();
        frame
    }
}
