//! The LCD controller device
//!
//! One flat struct owns all device state: the register window, the clocks,
//! the scanout descriptor, the pipeline state machine, vblank signaling,
//! the smart-panel refresh scheduler and the clock-rate coordinator.
//! Everything is reached through `&self` so the interrupt handler, the DMA
//! completion handler, the refresh worker and the commit path can share it.
//!
//! ## Locking
//!
//! - `crtc` (spin) serializes commits; held across polls and clock calls,
//!   never taken from interrupt context
//! - `descriptor` and the vblank/refresh state use short critical sections
//!   that are safe against the interrupt handler

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_time::Instant;

use crate::commit::Output;
use crate::config::{SocInfo, Timeouts, EVENT_QUEUE_DEPTH};
use crate::crtc::{Crtc, CrtcStatus};
use crate::descriptor::DescriptorManager;
use crate::device::{BusWidth, Clock, CoherentRegion, DmaAddr, RegisterIo, SlaveConfig, SlcdDma};
use crate::error::{AttachError, DisplayError};
use crate::pixclk::{ClockNotification, RateCoordinator};
use crate::refresh::RefreshScheduler;
use crate::regs::{self, LcdCtrl, LcdState};
use crate::vblank::{CompletedEvent, Vblank};

/// Everything the platform hands the core at attach time
pub struct Resources<R, C, D> {
    pub regs: R,
    /// `lcd_pclk`; mandatory
    pub pix_clk: Option<C>,
    /// `lcd`; only used on SoCs that need a device clock
    pub lcd_clk: Option<C>,
    /// Smart-panel push channel; optional
    pub dma: Option<D>,
    /// Bus address of the register window, for the SLCD data FIFO
    pub mmio_bus_base: DmaAddr,
    /// Coherent memory for the scanout descriptor
    pub descriptor_mem: CoherentRegion,
}

pub struct Display<R, C, D> {
    pub(crate) regs: R,
    pub(crate) soc: &'static SocInfo,
    pub(crate) timeouts: Timeouts,
    pub(crate) pix_clk: C,
    pub(crate) lcd_clk: Option<C>,
    pub(crate) descriptor: Mutex<CriticalSectionRawMutex, RefCell<DescriptorManager>>,
    pub(crate) crtc: spin::Mutex<Crtc>,
    /// Current panel runs in smart (command) mode
    pub(crate) panel_is_slcd: AtomicBool,
    pub(crate) vblank: Vblank,
    pub(crate) refresh: Option<RefreshScheduler<D>>,
    pub(crate) rate: RateCoordinator,
}

impl<R, C, D> Display<R, C, D>
where
    R: RegisterIo,
    C: Clock,
    D: SlcdDma,
{
    /// Acquire resources and bring the controller to its idle state.
    ///
    /// A missing smart-panel DMA channel only restricts the device to
    /// continuous scanout.
    pub fn attach(soc: &'static SocInfo, timeouts: Timeouts, res: Resources<R, C, D>) -> Result<Self, AttachError> {
        let refresh = match res.dma {
            Some(dma) => {
                let config = SlaveConfig {
                    dst_addr: res.mmio_bus_base + regs::SLCD_MDATA as DmaAddr,
                    src_width: BusWidth::Word,
                    dst_width: BusWidth::HalfWord,
                    src_maxburst: 64,
                    dst_maxburst: 8,
                };
                dma.configure(&config).map_err(|err| {
                    log::error!("lcd: unable to configure DMA: {}", err);
                    err
                })?;
                Some(RefreshScheduler::new(dma))
            }
            None => {
                log::info!("lcd: no SLCD DMA found, SLCD won't be used");
                None
            }
        };

        let Some(descriptor) = DescriptorManager::new(res.descriptor_mem) else {
            return Err(AttachError::DescriptorMemory);
        };

        let lcd_clk = if soc.needs_dev_clk {
            match res.lcd_clk {
                Some(clk) => Some(clk),
                None => {
                    log::error!("lcd: failed to get lcd clock");
                    return Err(AttachError::MissingDeviceClock);
                }
            }
        } else {
            None
        };

        let Some(pix_clk) = res.pix_clk else {
            log::error!("lcd: failed to get pixel clock");
            return Err(AttachError::MissingPixelClock);
        };

        pix_clk.enable().map_err(|err| {
            log::error!("lcd: unable to start pixel clock: {}", err);
            err
        })?;

        if let Some(clk) = &lcd_clk {
            let started = clk.set_rate(clk.parent_rate()).and_then(|()| clk.enable());
            if let Err(err) = started {
                log::error!("lcd: unable to start lcd clock: {}", err);
                pix_clk.disable();
                return Err(err.into());
            }
        }

        log::info!(
            "lcd: {} attached, descriptor at 0x{:08x}, max {}x{}",
            soc.name,
            descriptor.phys_addr(),
            soc.max_width,
            soc.max_height
        );

        Ok(Self {
            regs: res.regs,
            soc,
            timeouts,
            pix_clk,
            lcd_clk,
            descriptor: Mutex::new(RefCell::new(descriptor)),
            crtc: spin::Mutex::new(Crtc::new()),
            panel_is_slcd: AtomicBool::new(false),
            vblank: Vblank::new(),
            refresh,
            rate: RateCoordinator::new(),
        })
    }

    pub fn soc(&self) -> &'static SocInfo {
        self.soc
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn pixel_clock(&self) -> &C {
        &self.pix_clk
    }

    /// Whether the current panel is driven by explicit DMA pushes
    pub fn is_smart(&self) -> bool {
        self.panel_is_slcd.load(Ordering::Acquire)
    }

    pub(crate) fn smart_refresh(&self) -> Option<&RefreshScheduler<D>> {
        if self.is_smart() {
            self.refresh.as_ref()
        } else {
            None
        }
    }

    pub fn refresh(&self) -> Option<&RefreshScheduler<D>> {
        self.refresh.as_ref()
    }

    pub fn status(&self) -> CrtcStatus {
        self.crtc.lock().status()
    }

    /// Bus address of the scanout descriptor
    pub fn descriptor_phys(&self) -> DmaAddr {
        self.descriptor.lock(|desc| desc.borrow().phys_addr())
    }

    /// Read-only view of the scanout descriptor
    pub fn with_descriptor<T>(&self, f: impl FnOnce(&DescriptorManager) -> T) -> T {
        self.descriptor.lock(|desc| f(&desc.borrow()))
    }

    // =========================================================================
    // Vblank
    // =========================================================================

    /// Turn frame-boundary signaling on: unmask the end-of-frame interrupt
    /// (smart panels signal through DMA completion instead) and let waiters
    /// and armed events follow the frame counter.
    pub fn enable_vblank(&self) {
        self.set_eof_irq(true);
        self.vblank.on();
    }

    /// Turn frame-boundary signaling off. An armed completion event is
    /// delivered right away and waiters stop blocking.
    pub fn disable_vblank(&self) {
        self.set_eof_irq(false);
        self.vblank.off();
    }

    fn set_eof_irq(&self, on: bool) {
        if self.is_smart() {
            return;
        }
        let bits = if on { LcdCtrl::EOF_IRQ.bits() } else { 0 };
        self.regs.update_bits(regs::LCD_CTRL, LcdCtrl::EOF_IRQ.bits(), bits);
    }

    pub fn vblank_enabled(&self) -> bool {
        self.vblank.is_on()
    }

    /// LCD controller interrupt. Returns whether it was an end-of-frame.
    pub fn handle_interrupt(&self) -> bool {
        let state = LcdState::from_bits_retain(self.regs.read(regs::LCD_STATE));
        self.regs.update_bits(regs::LCD_STATE, LcdState::EOF_IRQ.bits(), 0);

        if state.contains(LcdState::EOF_IRQ) {
            self.vblank.handle();
            true
        } else {
            false
        }
    }

    /// Completion of a smart-panel push, from the DMA engine's callback.
    pub fn handle_push_complete(&self) {
        let Some(refresh) = &self.refresh else {
            return;
        };
        if !refresh.in_flight() {
            log::warn!("lcd: push completion without a push in flight");
            return;
        }
        self.vblank.handle();
        refresh.on_push_complete();
    }

    /// Issue a due smart-panel push. Called by a worker that owns the
    /// refresh timer; returns when the next push is due.
    pub fn run_refresh_work(&self) -> Option<Instant> {
        self.refresh.as_ref()?.run_pending(&self.descriptor)
    }

    /// Refresh worker task for executors. Sleeps until a push is due or
    /// the chain is kicked; returns at once without a smart-panel channel.
    pub async fn run_refresh(&self) {
        if let Some(refresh) = &self.refresh {
            refresh.run(&self.descriptor).await;
        }
    }

    pub fn frame_count(&self) -> u32 {
        self.vblank.count()
    }

    /// Block until the next frame boundary. Thread context only.
    pub fn wait_for_vblank(&self) -> Result<u32, DisplayError> {
        self.vblank
            .wait_one(self.timeouts.vblank_wait)
            .map_err(DisplayError::HardwareTimeout)
    }

    pub fn try_next_event(&self) -> Option<CompletedEvent> {
        self.vblank.try_next_event()
    }

    pub fn events(&self) -> &Channel<CriticalSectionRawMutex, CompletedEvent, EVENT_QUEUE_DEPTH> {
        self.vblank.events()
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Parent-clock rate-change notification. Blocks for up to one frame
    /// after a completed change; must not be called from interrupt context.
    pub fn clock_notify(&self, notification: ClockNotification) {
        // A dropped post-change still leaves the rate owed
        let _ = self.rate.notify(notification);
        self.rate.process(&self.vblank, self.timeouts.vblank_wait);
    }

    /// A pixel-clock rate application is owed to the next commit
    pub fn rate_change_pending(&self) -> bool {
        self.rate.is_pending()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop scanout through `outputs`, then release the clocks.
    ///
    /// The clocks are released even if the pipeline fails to stop; the
    /// first failure is returned.
    pub fn teardown(self, outputs: &[Output<'_>]) -> Result<(), DisplayError> {
        let mut result = Ok(());
        {
            let mut crtc = self.crtc.lock();
            if crtc.status() != CrtcStatus::Disabled {
                for output in outputs {
                    output.bridge.disable();
                }
                self.disable_vblank();
                result = crtc.disable(&self.regs, self.smart_refresh(), &self.timeouts);
                for output in outputs {
                    output.bridge.post_disable();
                }
            }
        }

        if let Some(refresh) = &self.refresh {
            if let Err(kind) = refresh.cancel_sync(self.timeouts.refresh_cancel) {
                result = result.and(Err(DisplayError::HardwareTimeout(kind)));
            }
        }
        // Flush anything still armed
        self.vblank.off();

        if let Some(clk) = &self.lcd_clk {
            clk.disable();
        }
        self.pix_clk.disable();
        log::info!("lcd: {} detached", self.soc.name);
        result
    }
}
