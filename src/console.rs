//! Formatted console output over the HAL TTY
//!
//! Lifecycle statistics and core reports are plain console text, not log
//! records, so they go straight to the platform TTY through this adapter.

use crate::hal::Hal;
use core::fmt;

/// `core::fmt::Write` adapter over [`Hal::tty_write`].
pub struct Console<'a, H: Hal>(pub &'a H);

impl<H: Hal> fmt::Write for Console<'_, H> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.tty_write(s);
        Ok(())
    }
}
