//! Smart-panel refresh scheduler
//!
//! Command-mode panels do not fetch pixels by themselves: every frame is a
//! DMA push of the descriptor's buffer into the SLCD FIFO. A finished push
//! counts as a frame boundary and re-arms the next push one refresh
//! interval later, so the chain sustains itself while the pipeline is on.
//!
//! State lives behind a short critical section shared by three contexts:
//! the commit path (`kick`, `cancel_sync`, `quiesce`), the worker that
//! runs due pushes (`run_pending`, or the [`run`](RefreshScheduler::run)
//! loop) and the DMA completion handler (`on_push_complete`). Every change
//! that brings a push closer raises the wake signal, so the worker sleeps
//! instead of polling.

use core::cell::Cell;
use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::{block_for, with_deadline, Duration, Instant};

use crate::config::FALLBACK_REFRESH_HZ;
use crate::descriptor::DescriptorManager;
use crate::device::SlcdDma;
use crate::error::TimeoutKind;

const DRAIN_POLL: Duration = Duration::from_micros(20);

#[derive(Debug, Clone, Copy)]
struct RefreshState {
    /// Chain alive: completions re-arm the next push
    running: bool,
    /// Next push due at
    due: Option<Instant>,
    /// A push has been issued and not yet completed
    in_flight: bool,
    /// Descriptor being rewritten, no push may start
    held: bool,
    interval: Duration,
}

impl RefreshState {
    const fn new() -> Self {
        Self {
            running: false,
            due: None,
            in_flight: false,
            held: false,
            interval: Duration::from_micros(1_000_000 / FALLBACK_REFRESH_HZ as u64),
        }
    }
}

/// Refresh interval for a vertical refresh rate in Hz
pub fn refresh_interval(vrefresh: u32) -> Duration {
    let hz = if vrefresh == 0 { FALLBACK_REFRESH_HZ } else { vrefresh };
    Duration::from_micros(1_000_000 / hz as u64)
}

pub struct RefreshScheduler<D> {
    dma: D,
    state: Mutex<CriticalSectionRawMutex, Cell<RefreshState>>,
    /// Raised when a push may have become due earlier than the worker expects
    wake: Signal<CriticalSectionRawMutex, ()>,
    pushes: AtomicU32,
}

impl<D: SlcdDma> RefreshScheduler<D> {
    pub fn new(dma: D) -> Self {
        Self {
            dma,
            state: Mutex::new(Cell::new(RefreshState::new())),
            wake: Signal::new(),
            pushes: AtomicU32::new(0),
        }
    }

    pub fn dma(&self) -> &D {
        &self.dma
    }

    fn update<R>(&self, f: impl FnOnce(&mut RefreshState) -> R) -> R {
        self.state.lock(|cell| {
            let mut state = cell.get();
            let ret = f(&mut state);
            cell.set(state);
            ret
        })
    }

    /// Start (or keep) the chain and request a push as soon as possible.
    pub fn kick(&self, interval: Duration) {
        self.update(|s| {
            s.running = true;
            s.interval = interval;
            // An in-flight push re-arms on completion
            if !s.in_flight {
                s.due = Some(Instant::now());
            }
        });
        self.wake.signal(());
    }

    /// Whether the worker has a wake-up it has not consumed yet
    pub fn wake_pending(&self) -> bool {
        self.wake.signaled()
    }

    pub fn is_running(&self) -> bool {
        self.update(|s| s.running)
    }

    pub fn in_flight(&self) -> bool {
        self.update(|s| s.in_flight)
    }

    /// When the next push is due, if one is scheduled
    pub fn next_due(&self) -> Option<Instant> {
        self.update(|s| s.due)
    }

    /// Pushes issued since attach
    pub fn push_count(&self) -> u32 {
        self.pushes.load(Ordering::Acquire)
    }

    /// Issue the scheduled push if it is due. Worker context.
    ///
    /// Returns the time the next push is due, if any.
    pub fn run_pending(&self, descriptor: &Mutex<CriticalSectionRawMutex, RefCell<DescriptorManager>>) -> Option<Instant> {
        let now = Instant::now();
        let start = self.update(|s| match s.due {
            Some(due) if s.running && !s.held && !s.in_flight && due <= now => {
                s.due = None;
                s.in_flight = true;
                true
            }
            _ => false,
        });
        if !start {
            return self.next_due();
        }

        let (addr, len) = descriptor.lock(|desc| {
            let desc = desc.borrow();
            (desc.buffer(), desc.transfer_len())
        });

        match self.dma.push_single(addr, len) {
            Ok(()) => {
                self.pushes.fetch_add(1, Ordering::AcqRel);
                log::trace!("lcd: slcd push 0x{:08x} ({} bytes)", addr, len);
            }
            Err(err) => {
                log::error!("lcd: unable to prepare DMA: {}", err);
                self.update(|s| s.in_flight = false);
            }
        }
        self.next_due()
    }

    /// A push finished. DMA completion context.
    ///
    /// Returns whether a push was actually outstanding.
    pub fn on_push_complete(&self) -> bool {
        let now = Instant::now();
        let (was_in_flight, rearmed) = self.update(|s| {
            let was_in_flight = s.in_flight;
            s.in_flight = false;
            let rearm = s.running && was_in_flight;
            if rearm {
                s.due = Some(now + s.interval);
            }
            (was_in_flight, rearm)
        });
        if rearmed {
            self.wake.signal(());
        }
        was_in_flight
    }

    /// Stop the chain and wait for a push already in flight to finish.
    ///
    /// On return no push is outstanding and none will be issued until the
    /// next `kick`.
    pub fn cancel_sync(&self, timeout: Duration) -> Result<(), TimeoutKind> {
        self.update(|s| {
            s.running = false;
            s.due = None;
        });
        self.drain(timeout)
    }

    /// Run `f` while no push can be in flight or start.
    pub fn quiesce<R>(&self, timeout: Duration, f: impl FnOnce() -> R) -> Result<R, TimeoutKind> {
        self.update(|s| s.held = true);
        let drained = self.drain(timeout);
        let ret = drained.map(|()| f());
        self.update(|s| s.held = false);
        // A push that fell due while held has been waiting for this
        self.wake.signal(());
        ret
    }

    /// Worker loop: issue pushes as they fall due and sleep in between,
    /// until the next deadline or the next wake-up. Never returns.
    pub async fn run(&self, descriptor: &Mutex<CriticalSectionRawMutex, RefCell<DescriptorManager>>) {
        loop {
            match self.run_pending(descriptor) {
                Some(due) if due > Instant::now() => {
                    // Timing out just means the push is due
                    let _ = with_deadline(due, self.wake.wait()).await;
                }
                // Idle, in flight, or held by a descriptor rewrite
                _ => self.wake.wait().await,
            }
        }
    }

    fn drain(&self, timeout: Duration) -> Result<(), TimeoutKind> {
        let start = Instant::now();
        while self.in_flight() {
            if start.elapsed() > timeout {
                log::error!("lcd: slcd push still in flight after {} ms", timeout.as_millis());
                return Err(TimeoutKind::RefreshCancel);
            }
            block_for(DRAIN_POLL);
        }
        Ok(())
    }
}
