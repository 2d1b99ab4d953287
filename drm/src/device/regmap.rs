//! Register access
//!
//! `RegisterIo` is the typed register capability the core drives; `Mmio` is
//! the volatile implementation over the controller's mapped window.

use core::ptr::{read_volatile, write_volatile};

use embassy_time::{block_for, Duration, Instant};

use crate::regs;

/// 32-bit register read/write/update-bits over a fixed address range.
pub trait RegisterIo: Send + Sync {
    /// Read the register at `offset`
    fn read(&self, offset: usize) -> u32;

    /// Write `value` to the register at `offset`
    fn write(&self, offset: usize, value: u32);

    /// Replace the bits selected by `mask` with those of `value`.
    ///
    /// Only writes when the result differs from the current contents.
    fn update_bits(&self, offset: usize, mask: u32, value: u32) {
        let old = self.read(offset);
        let new = (old & !mask) | (value & mask);
        if new != old {
            self.write(offset, new);
        }
    }
}

/// Memory-mapped LCD controller registers
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// # Safety
    ///
    /// `base` must be the virtual address of the mapped LCD controller
    /// window, valid for the lifetime of the returned value.
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }
}

impl RegisterIo for Mmio {
    #[inline]
    fn read(&self, offset: usize) -> u32 {
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    #[inline]
    fn write(&self, offset: usize, value: u32) {
        if !regs::is_writeable(offset) {
            log::warn!("lcd: dropping write of 0x{:08x} to read-only register 0x{:02x}", value, offset);
            return;
        }
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }
}

/// The polled condition did not become true before the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimeout {
    /// Last value read from the register
    pub last: u32,
}

/// Poll `offset` every `interval` until `cond` holds.
///
/// `timeout` of `None` polls without a bound; callers that must not hang
/// always pass a deadline.
pub fn read_poll_timeout<R, F>(
    regs: &R,
    offset: usize,
    cond: F,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<u32, PollTimeout>
where
    R: RegisterIo + ?Sized,
    F: Fn(u32) -> bool,
{
    let start = Instant::now();
    loop {
        let val = regs.read(offset);
        if cond(val) {
            return Ok(val);
        }
        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                // One last look, the deadline may have expired while we slept
                let val = regs.read(offset);
                return if cond(val) { Ok(val) } else { Err(PollTimeout { last: val }) };
            }
        }
        if interval.as_ticks() == 0 {
            core::hint::spin_loop();
        } else {
            block_for(interval);
        }
    }
}
