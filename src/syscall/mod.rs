//! System call types and wire format
//!
//! User space issues a system call by filling the argument block at the
//! fixed virtual address [`SYSCALL_ARG`](crate::config::SYSCALL_ARG) and
//! executing `ecall`. The trap dispatcher copies the block into the
//! caller's PCB, where it lives as a [`Syscall`] record until the
//! scheduler completes it. A completed receive is copied back out to the
//! same address.
//!
//! Unknown syscall numbers indicate a broken user library and are fatal.

mod ipc;

pub(crate) use ipc::try_syscall;

use crate::config::{Pid, MSG_LEN};

/// send a message to `receiver`
pub const SYS_SEND: u32 = 1;
/// receive a message, optionally filtered by sender
pub const SYS_RECV: u32 = 2;
/// block for a number of microseconds
pub const SYS_SLEEP: u32 = 3;
/// give up the rest of the current quantum
pub const SYS_YIELD: u32 = 4;

/// What a syscall record asks the kernel to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallKind {
    /// empty slot; reaching the dispatcher with this is fatal
    Unused,
    /// synchronous send
    Send,
    /// synchronous receive
    Recv,
    /// timed sleep
    Sleep,
    /// voluntary yield
    Yield,
}

impl SyscallKind {
    /// Decode a wire syscall number.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SyscallKind::Unused,
            SYS_SEND => SyscallKind::Send,
            SYS_RECV => SyscallKind::Recv,
            SYS_SLEEP => SyscallKind::Sleep,
            SYS_YIELD => SyscallKind::Yield,
            _ => panic!("syscall: unknown type {}", raw),
        }
    }

    fn to_raw(self) -> u32 {
        match self {
            SyscallKind::Unused => 0,
            SyscallKind::Send => SYS_SEND,
            SyscallKind::Recv => SYS_RECV,
            SyscallKind::Sleep => SYS_SLEEP,
            SyscallKind::Yield => SYS_YIELD,
        }
    }
}

/// Completion state of an in-kernel syscall record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallStatus {
    /// waiting for the scheduler to make progress
    Pending,
    /// finished in the kernel; result not yet observed by user space
    Done,
}

/// The syscall argument block as it appears in user memory.
///
/// Layout is part of the user ABI; the kernel validates the raw fields
/// before acting on them.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallFrame {
    /// one of the `SYS_*` numbers
    pub kind: u32,
    /// 0 pending, 1 done; written by the kernel
    pub status: u32,
    /// source pid; `PID_ANY` as a receive filter matches every sender
    pub sender: Pid,
    /// destination pid (send only)
    pub receiver: Pid,
    /// opaque message payload
    pub content: [u8; MSG_LEN],
}

impl SyscallFrame {
    /// An all-zero frame.
    pub const fn zeroed() -> Self {
        Self {
            kind: 0,
            status: 0,
            sender: 0,
            receiver: 0,
            content: [0; MSG_LEN],
        }
    }

    /// Frame for sending `msg` to `receiver`. Panics if `msg` exceeds the
    /// payload size; the user library enforces this bound.
    pub fn send(receiver: Pid, msg: &[u8]) -> Self {
        let mut frame = Self::zeroed();
        frame.kind = SYS_SEND;
        frame.receiver = receiver;
        frame.content[..msg.len()].copy_from_slice(msg);
        frame
    }

    /// Frame for receiving from `sender` (or `PID_ANY`).
    pub fn recv(sender: Pid) -> Self {
        let mut frame = Self::zeroed();
        frame.kind = SYS_RECV;
        frame.sender = sender;
        frame
    }

    /// Frame for sleeping `usec` microseconds. The duration rides in the
    /// first bytes of the payload.
    pub fn sleep(usec: u64) -> Self {
        let mut frame = Self::zeroed();
        frame.kind = SYS_SLEEP;
        frame.content[..8].copy_from_slice(&usec.to_le_bytes());
        frame
    }

    /// Frame for yielding the processor.
    pub fn yield_now() -> Self {
        let mut frame = Self::zeroed();
        frame.kind = SYS_YIELD;
        frame
    }
}

/// In-kernel syscall record held in the PCB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Syscall {
    /// requested operation
    pub kind: SyscallKind,
    /// completion state
    pub status: SyscallStatus,
    /// source pid, or the receive filter
    pub sender: Pid,
    /// destination pid (send only)
    pub receiver: Pid,
    /// message payload
    pub content: [u8; MSG_LEN],
}

impl Syscall {
    /// The record of a PCB that has never issued a syscall.
    pub const fn unused() -> Self {
        Self {
            kind: SyscallKind::Unused,
            status: SyscallStatus::Done,
            sender: 0,
            receiver: 0,
            content: [0; MSG_LEN],
        }
    }

    /// Validate a user frame into a pending kernel record.
    pub fn from_frame(frame: &SyscallFrame) -> Self {
        Self {
            kind: SyscallKind::from_raw(frame.kind),
            status: SyscallStatus::Pending,
            sender: frame.sender,
            receiver: frame.receiver,
            content: frame.content,
        }
    }

    /// Encode the record for copy-back to user space.
    pub fn to_frame(&self) -> SyscallFrame {
        SyscallFrame {
            kind: self.kind.to_raw(),
            status: match self.status {
                SyscallStatus::Pending => 0,
                SyscallStatus::Done => 1,
            },
            sender: self.sender,
            receiver: self.receiver,
            content: self.content,
        }
    }

    /// Sleep duration carried in the payload.
    pub fn sleep_usec(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&self.content[..8]);
        u64::from_le_bytes(bytes)
    }
}
