//! Pixel-clock rate coordination
//!
//! The pixel clock shares its parent with other consumers. When the parent
//! rate changes underneath us, the clock framework posts a notification;
//! servicing it marks the pixel rate as needing re-application and waits out
//! one frame so the hardware is not mid-scan when the rate shifts. The rate
//! itself is re-applied by the next commit.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::Duration;

use crate::config::CLOCK_QUEUE_DEPTH;
use crate::device::{Clock, ClockError};
use crate::vblank::Vblank;

/// Parent clock rate-change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockNotification {
    PreRateChange { old_hz: u64, new_hz: u64 },
    PostRateChange { old_hz: u64, new_hz: u64 },
    AbortRateChange { old_hz: u64, new_hz: u64 },
}

pub struct RateCoordinator {
    pending: AtomicBool,
    queue: Channel<CriticalSectionRawMutex, ClockNotification, CLOCK_QUEUE_DEPTH>,
    applied: AtomicU32,
}

impl RateCoordinator {
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            queue: Channel::new(),
            applied: AtomicU32::new(0),
        }
    }

    /// Queue a notification. Hands it back when the queue is full; a
    /// dropped post-change notification still marks the rate pending.
    pub fn notify(&self, notification: ClockNotification) -> Result<(), ClockNotification> {
        self.queue.try_send(notification).map_err(|err| match err {
            embassy_sync::channel::TrySendError::Full(n) => {
                log::warn!("lcd: clock notification queue full, dropping {:?}", n);
                if let ClockNotification::PostRateChange { .. } = n {
                    self.mark_pending();
                }
                n
            }
        })
    }

    /// Service every queued notification. Thread context only: a
    /// post-change notification blocks for one frame boundary.
    ///
    /// Returns the number of notifications handled.
    pub fn process(&self, vblank: &Vblank, frame_timeout: Duration) -> usize {
        let mut handled = 0;
        while let Ok(notification) = self.queue.try_receive() {
            handled += 1;
            match notification {
                ClockNotification::PostRateChange { old_hz, new_hz } => {
                    log::debug!("lcd: parent clock {} -> {} Hz", old_hz, new_hz);
                    self.mark_pending();
                    if vblank.wait_one(frame_timeout).is_err() {
                        log::warn!("lcd: no vblank after parent clock change");
                    }
                }
                other => log::trace!("lcd: ignoring {:?}", other),
            }
        }
        handled
    }

    pub fn mark_pending(&self) {
        self.pending.store(true, Ordering::Release);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Set the pixel clock to `hz` and clear the pending flag on success.
    ///
    /// Applying the current rate again is harmless.
    pub fn apply<C: Clock + ?Sized>(&self, clk: &C, hz: u64) -> Result<(), ClockError> {
        clk.set_rate(hz)?;
        self.pending.store(false, Ordering::Release);
        self.applied.fetch_add(1, Ordering::AcqRel);
        log::debug!("lcd: pixel clock set to {} Hz", hz);
        Ok(())
    }

    /// Successful rate applications since attach
    #[cfg(test)]
    pub fn applied_count(&self) -> u32 {
        self.applied.load(Ordering::Acquire)
    }
}

impl Default for RateCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
