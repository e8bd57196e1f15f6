//! Synchronous message-passing rendezvous
//!
//! Send and receive both block the caller until a matching partner
//! exists. A pending send is retried on every scheduling pass; delivery
//! happens entirely inside the kernel PCBs, and the completed record is
//! copied out to the receiver's user page when its side of the
//! rendezvous closes. A partner that is not ready is never an error;
//! the syscall simply stays pending.

use super::{SyscallKind, SyscallStatus};
use crate::config::{Pid, MAX_NPROCESS, PID_ANY, SYSCALL_ARG};
use crate::hal::Hal;
use crate::process::{ProcStatus, ProcTable};
use crate::uaccess::UserPtr;

/// Advance the pending syscall in `slot` as far as it can go this pass.
pub(crate) fn try_syscall<H: Hal>(hal: &H, table: &mut ProcTable, slot: usize, now: u64) {
    match table.slot(slot).syscall.kind {
        SyscallKind::Send => try_send(table, slot),
        SyscallKind::Recv => try_recv(hal, table, slot, now),
        // the scheduler wakes sleepers when their deadline passes
        SyscallKind::Sleep => {}
        SyscallKind::Yield => try_yield(table, slot, now),
        SyscallKind::Unused => panic!(
            "try_syscall: pid {} blocked on no syscall",
            table.slot(slot).pid
        ),
    }
}

/// Attempt delivery of `slot`'s pending send.
///
/// Succeeds only if the receiver is blocked in a matching receive whose
/// sender filter admits us; on success the payload lands in the
/// receiver's record and the receiver's side is marked done. A receiver
/// pid missing from the whole table is a misconfigured system and fatal.
fn try_send(table: &mut ProcTable, slot: usize) {
    let sender_pid = table.slot(slot).pid;
    let receiver_pid = table.slot(slot).syscall.receiver;
    let content = table.slot(slot).syscall.content;

    for i in 1..=MAX_NPROCESS {
        let dst = table.slot_mut(i);
        if dst.pid == receiver_pid && dst.status != ProcStatus::Unused {
            // not receiving, or already served: try again next pass
            if !(dst.syscall.kind == SyscallKind::Recv
                && dst.syscall.status == SyscallStatus::Pending)
            {
                return;
            }
            // filtered receive addressed to someone else
            if !(dst.syscall.sender == PID_ANY || dst.syscall.sender == sender_pid) {
                return;
            }

            dst.syscall.status = SyscallStatus::Done;
            dst.syscall.sender = sender_pid;
            dst.syscall.content = content;
            trace!("P[{sender_pid}] delivered message to P[{receiver_pid}]");
            return;
        }
    }
    panic!("try_send: unknown receiver pid={}", receiver_pid);
}

/// Close out `slot`'s receive once a sender has delivered: copy the
/// completed record back to the receiver's user page and make both ends
/// of the rendezvous runnable.
fn try_recv<H: Hal>(hal: &H, table: &mut ProcTable, slot: usize, now: u64) {
    if table.slot(slot).syscall.status == SyscallStatus::Pending {
        return;
    }

    let receiver_pid = table.slot(slot).pid;
    let sender_pid = table.slot(slot).syscall.sender;
    let frame = table.slot(slot).syscall.to_frame();
    unsafe { UserPtr::new(hal, receiver_pid, SYSCALL_ARG).write(frame) };

    table.set_runnable(receiver_pid, now);
    table.set_runnable(sender_pid, now);
}

/// A yield completes immediately; the caller rejoins the runnable set.
fn try_yield(table: &mut ProcTable, slot: usize, now: u64) {
    if table.slot(slot).syscall.status == SyscallStatus::Pending {
        let pid: Pid = table.slot(slot).pid;
        table.slot_mut(slot).syscall.status = SyscallStatus::Done;
        table.set_runnable(pid, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::mock::MockHal;
    use crate::syscall::{Syscall, SyscallFrame};

    fn table_with(n: usize) -> ProcTable {
        let mut table = ProcTable::new();
        for _ in 0..n {
            let pid = table.alloc(0);
            table.set_ready(pid);
        }
        table
    }

    fn block_on(table: &mut ProcTable, slot: usize, frame: SyscallFrame) {
        let pid = table.slot(slot).pid;
        table.slot_mut(slot).syscall = Syscall::from_frame(&frame);
        table.set_pending(pid, 0);
    }

    #[test]
    fn filtered_receive_admits_only_the_named_sender() {
        let hal = MockHal::new();
        let mut table = table_with(3);
        block_on(&mut table, 2, SyscallFrame::recv(3));
        block_on(&mut table, 1, SyscallFrame::send(2, b"x"));
        block_on(&mut table, 3, SyscallFrame::send(2, b"y"));

        // pid 1 does not pass the filter
        try_syscall(&hal, &mut table, 1, 0);
        assert_eq!(table.slot(2).syscall.status, SyscallStatus::Pending);

        // pid 3 does
        try_syscall(&hal, &mut table, 3, 0);
        let record = table.slot(2).syscall;
        assert_eq!(record.status, SyscallStatus::Done);
        assert_eq!(record.sender, 3);
        assert_eq!(&record.content[..1], b"y");
    }

    #[test]
    fn completed_receive_copies_out_and_unblocks_both() {
        let hal = MockHal::new();
        let mut table = table_with(2);
        block_on(&mut table, 2, SyscallFrame::recv(crate::config::PID_ANY));
        block_on(&mut table, 1, SyscallFrame::send(2, b"hello"));

        try_syscall(&hal, &mut table, 1, 0);
        try_syscall(&hal, &mut table, 2, 0);

        assert_eq!(table.slot(1).status, ProcStatus::Runnable);
        assert_eq!(table.slot(2).status, ProcStatus::Runnable);
        let frame = hal.user_frame(2);
        assert_eq!(frame.status, 1);
        assert_eq!(frame.sender, 1);
        assert_eq!(&frame.content[..5], b"hello");
    }

    #[test]
    fn delivery_is_not_repeated_on_later_passes() {
        let hal = MockHal::new();
        let mut table = table_with(3);
        block_on(&mut table, 2, SyscallFrame::recv(crate::config::PID_ANY));
        block_on(&mut table, 1, SyscallFrame::send(2, b"first"));
        block_on(&mut table, 3, SyscallFrame::send(2, b"second"));

        try_syscall(&hal, &mut table, 1, 0);
        // the second sender finds the receiver already served
        try_syscall(&hal, &mut table, 3, 0);
        assert_eq!(&table.slot(2).syscall.content[..5], b"first");
        assert_eq!(table.slot(3).syscall.status, SyscallStatus::Pending);
    }

    #[test]
    #[should_panic(expected = "unknown receiver")]
    fn sending_to_an_absent_pid_is_fatal() {
        let hal = MockHal::new();
        let mut table = table_with(1);
        block_on(&mut table, 1, SyscallFrame::send(42, b"?"));
        try_syscall(&hal, &mut table, 1, 0);
    }
}
