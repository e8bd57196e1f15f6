//! Core of a small preemptive multicore kernel for RISC-V class machines.
//!
//! Four entangled concerns live here: the trap dispatcher, the process
//! table, the multi-level-feedback-queue scheduler and synchronous
//! message-passing IPC. Every timer interrupt, system call and process
//! state change flows through [`trap::Kernel`], serialized by a single
//! global kernel lock taken at trap entry and released at trap exit.
//!
//! Everything machine-specific sits behind the [`hal::Hal`] trait; the
//! dispatcher and scheduler contain no architectural opcodes and can be
//! driven on a hosted target for testing. [`hal::machine::MachineHal`]
//! implements the trait for a RISC-V machine-mode environment.

#![cfg_attr(not(test), no_std)]

#[macro_use]
extern crate log;

pub mod config;
pub mod console;
pub mod hal;
pub mod process;
pub mod syscall;
pub mod trap;
pub mod uaccess;

mod boot;

pub use boot::KERNEL;
pub use trap::{Kernel, TrapOutcome};
