//! Multi-level feedback queue policy
//!
//! Processes start at the top level and are demoted as they consume
//! their per-level quantum, so CPU-bound work sinks while short-lived
//! work stays responsive. Two boosts counter starvation: pending TTY
//! input resets the shell to the top level, and every reset period the
//! whole table is boosted back to the top.

use super::pcb::ProcStatus;
use super::{Process, ProcTable};
use crate::config::{BASE_QUANTUM_US, MAX_NPROCESS, MLFQ_LEVELS, RESET_PERIOD_US, SHELL_PID};

/// Runtime quantum of a level, in microseconds.
pub fn quantum_us(level: usize) -> u64 {
    (level as u64 + 1) * BASE_QUANTUM_US
}

/// Charge `delta_us` of runtime to `p`'s current level, demoting it one
/// level when the quantum is exhausted. The bottom level is sticky and
/// accrues nothing.
pub fn account(p: &mut Process, delta_us: u64) {
    if p.queue_level >= MLFQ_LEVELS - 1 {
        return;
    }
    p.queue_time_us += delta_us;
    if p.queue_time_us >= quantum_us(p.queue_level) {
        p.queue_level += 1;
        p.queue_time_us = 0;
        trace!("P[{}] demoted to level {}", p.pid, p.queue_level);
    }
}

/// Boost bookkeeping: the timestamp of the last global reset.
pub struct Mlfq {
    last_reset_us: u64,
}

impl Mlfq {
    /// Policy state at boot.
    pub const fn new() -> Self {
        Self { last_reset_us: 0 }
    }

    /// Run once per scheduling pass.
    ///
    /// Pending TTY input boosts only the shell; a full reset every
    /// [`RESET_PERIOD_US`] boosts every live process back to level 0.
    pub fn maybe_reset(&mut self, table: &mut ProcTable, now: u64, tty_pending: bool) {
        if tty_pending {
            for i in 1..=MAX_NPROCESS {
                let p = table.slot_mut(i);
                if p.pid == SHELL_PID && p.status != ProcStatus::Unused {
                    p.queue_level = 0;
                    p.queue_time_us = 0;
                    break;
                }
            }
        }

        if now - self.last_reset_us >= RESET_PERIOD_US {
            trace!("mlfq: global priority boost at {now}us");
            for i in 1..=MAX_NPROCESS {
                let p = table.slot_mut(i);
                if p.status != ProcStatus::Unused {
                    p.queue_level = 0;
                    p.queue_time_us = 0;
                }
            }
            self.last_reset_us = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantum_grows_linearly() {
        assert_eq!(quantum_us(0), 100_000);
        assert_eq!(quantum_us(1), 200_000);
        assert_eq!(quantum_us(4), 500_000);
    }

    #[test]
    fn demotion_ladder_under_tick_sized_charges() {
        let mut p = Process::unused();
        p.pid = 1;
        let mut total = 0u64;
        // 10ms per tick, the preemption cadence
        while p.queue_level < MLFQ_LEVELS - 1 {
            account(&mut p, 10_000);
            total += 10_000;
            assert!(p.queue_time_us < quantum_us(p.queue_level));
        }
        // 100 + 200 + 300 + 400 ms of runtime reaches the bottom
        assert_eq!(total, 1_000_000);
        assert_eq!(p.queue_level, 4);
        assert_eq!(p.queue_time_us, 0);
    }

    #[test]
    fn one_charge_demotes_at_most_one_level() {
        let mut p = Process::unused();
        account(&mut p, 1_000_000);
        assert_eq!(p.queue_level, 1);
        assert_eq!(p.queue_time_us, 0);
    }

    #[test]
    fn bottom_level_is_sticky() {
        let mut p = Process::unused();
        p.queue_level = MLFQ_LEVELS - 1;
        account(&mut p, 10_000_000);
        assert_eq!(p.queue_level, MLFQ_LEVELS - 1);
        assert_eq!(p.queue_time_us, 0);
    }

    #[test]
    fn global_reset_boosts_every_live_process() {
        let mut table = ProcTable::new();
        let a = table.alloc(0);
        let b = table.alloc(0);
        table.slot_mut(1).queue_level = 4;
        table.slot_mut(2).queue_level = 2;
        table.slot_mut(2).queue_time_us = 5_000;

        let mut mlfq = Mlfq::new();
        // before the period elapses nothing happens
        mlfq.maybe_reset(&mut table, RESET_PERIOD_US - 1, false);
        assert_eq!(table.slot(1).queue_level, 4);

        mlfq.maybe_reset(&mut table, RESET_PERIOD_US, false);
        for i in [1usize, 2] {
            assert_eq!(table.slot(i).queue_level, 0);
            assert_eq!(table.slot(i).queue_time_us, 0);
        }
        let _ = (a, b);

        // the period restarts from the reset instant
        table.slot_mut(1).queue_level = 3;
        mlfq.maybe_reset(&mut table, RESET_PERIOD_US + 1, false);
        assert_eq!(table.slot(1).queue_level, 3);
    }

    #[test]
    fn tty_input_boosts_only_the_shell() {
        let mut table = ProcTable::new();
        for _ in 0..4 {
            table.alloc(0);
        }
        // pid 4 is the shell, in slot 4
        table.slot_mut(4).queue_level = 3;
        table.slot_mut(3).queue_level = 2;

        let mut mlfq = Mlfq::new();
        mlfq.maybe_reset(&mut table, 1_000, true);
        assert_eq!(table.slot(4).queue_level, 0);
        assert_eq!(table.slot(4).queue_time_us, 0);
        assert_eq!(table.slot(3).queue_level, 2);
    }
}
