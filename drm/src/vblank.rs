//! Frame completion and vblank signaling
//!
//! Every end-of-frame, whether raised by the controller interrupt or by a
//! finished smart-panel push, goes through [`Vblank::handle`]: the frame
//! counter advances, waiters polling for the next frame are released and
//! the armed completion event (at most one) is delivered to the compositor.
//!
//! ## Contexts
//!
//! - `handle` runs in interrupt context and never blocks
//! - `wait_one` runs in thread context and spins until the counter moves

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::{block_for, Duration, Instant};

use crate::config::EVENT_QUEUE_DEPTH;
use crate::error::TimeoutKind;

/// Completion event requested by a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    /// Opaque compositor cookie, returned unchanged
    pub token: u64,
}

/// A delivered completion event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedEvent {
    pub token: u64,
    /// Frame counter at delivery
    pub frame: u32,
    pub timestamp: Instant,
}

/// Interval between frame-counter checks while waiting
const WAIT_POLL: Duration = Duration::from_micros(50);

pub struct Vblank {
    count: AtomicU32,
    /// Vblank reporting is on (pipeline scanning out)
    enabled: AtomicBool,
    waiters: AtomicUsize,
    armed: Mutex<CriticalSectionRawMutex, Cell<Option<PendingEvent>>>,
    events: Channel<CriticalSectionRawMutex, CompletedEvent, EVENT_QUEUE_DEPTH>,
}

impl Vblank {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
            armed: Mutex::new(Cell::new(None)),
            events: Channel::new(),
        }
    }

    /// Frames seen since attach
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    pub fn is_on(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn on(&self) {
        self.enabled.store(true, Ordering::Release);
    }

    /// Stop vblank reporting; an armed event is sent right away since no
    /// further frame will deliver it.
    pub fn off(&self) {
        self.enabled.store(false, Ordering::Release);
        if let Some(event) = self.armed.lock(|slot| slot.take()) {
            self.deliver(event);
        }
    }

    /// One frame boundary passed. Interrupt safe; frame sources (the LCD
    /// interrupt or push completion) do not run concurrently.
    ///
    /// The armed event is queued before the counter moves, so a thread
    /// released by the new count always finds it.
    pub fn handle(&self) -> u32 {
        let frame = self.count().wrapping_add(1);
        if let Some(event) = self.armed.lock(|slot| slot.take()) {
            self.deliver_at(event, frame);
        }
        self.count.store(frame, Ordering::Release);
        log::trace!("lcd: vblank {}", frame);
        frame
    }

    /// Arm `event` for the next frame boundary, or send it now when no
    /// vblank will come.
    pub fn arm_or_send(&self, event: PendingEvent) {
        let unsent = self.armed.lock(|slot| {
            if self.is_on() {
                slot.replace(Some(event))
            } else {
                Some(event)
            }
        });
        // A replaced event means a commit raced the previous one's delivery
        if let Some(event) = unsent {
            self.deliver(event);
        }
    }

    /// Deliver `event` immediately as a synthetic vblank
    pub fn send_now(&self, event: PendingEvent) {
        self.deliver(event);
    }

    #[cfg(test)]
    pub fn has_armed(&self) -> bool {
        self.armed.lock(|slot| slot.get().is_some())
    }

    fn deliver(&self, event: PendingEvent) {
        self.deliver_at(event, self.count());
    }

    fn deliver_at(&self, event: PendingEvent, frame: u32) {
        let completed = CompletedEvent {
            token: event.token,
            frame,
            timestamp: Instant::now(),
        };
        if self.events.try_send(completed).is_err() {
            log::warn!("lcd: event queue full, dropping completion event {:#x}", event.token);
        }
    }

    /// Block until the frame counter advances.
    ///
    /// Returns the new count, or immediately with the current one when
    /// vblank is off. Must not be called from interrupt context.
    pub fn wait_one(&self, timeout: Duration) -> Result<u32, TimeoutKind> {
        let start_count = self.count();
        if !self.is_on() {
            return Ok(start_count);
        }

        let start = Instant::now();
        self.waiters.fetch_add(1, Ordering::SeqCst);
        let result = loop {
            let now_count = self.count();
            if now_count != start_count {
                break Ok(now_count);
            }
            if start.elapsed() > timeout {
                break Err(TimeoutKind::Vblank);
            }
            block_for(WAIT_POLL);
        };
        self.waiters.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Whether any thread is blocked in [`wait_one`](Self::wait_one)
    #[cfg(test)]
    pub fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::Relaxed) > 0
    }

    /// Next delivered completion event, if any
    pub fn try_next_event(&self) -> Option<CompletedEvent> {
        self.events.try_receive().ok()
    }

    /// Queue of delivered completion events, for async consumers
    pub fn events(&self) -> &Channel<CriticalSectionRawMutex, CompletedEvent, EVENT_QUEUE_DEPTH> {
        &self.events
    }
}

impl Default for Vblank {
    fn default() -> Self {
        Self::new()
    }
}
