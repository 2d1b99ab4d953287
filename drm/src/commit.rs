//! Atomic commit orchestration
//!
//! A commit moves the pipeline from its current state to a proposed
//! [`Configuration`] in one call:
//!
//! 1. modeset: bridge disable, vblank off, pipeline disable, bridge
//!    post-disable, then panel config and bridge mode-set
//! 2. plane: rewrite the scanout descriptor
//! 3. modeset: re-read the panel mode, write timing and format, owe a
//!    pixel-clock rate application
//! 4. apply an owed rate (after one frame for in-place updates)
//! 5. modeset: bridge pre-enable, pipeline enable, vblank on, bridge enable
//! 6. in-place smart-panel update: push immediately
//! 7. arm or send the completion event, then wait out one frame
//!
//! Commits are serialized by the pipeline lock. A failed validation never
//! touches hardware; a hardware timeout abandons the commit where it
//! stopped and delivers the event right away.

use crate::crtc::{read_panel_is_slcd, Crtc, CrtcStatus};
use crate::device::{Bridge, Clock, ConnectorInfo, RegisterIo, ScanoutBuffer, SlcdDma};
use crate::display::Display;
use crate::error::DisplayError;
use crate::mode::{check_connector, Configuration, PixelFormat};
use crate::refresh::refresh_interval;
use crate::regs;
use crate::vblank::PendingEvent;

/// Primary plane contents for a commit
#[derive(Clone, Copy)]
pub struct PlaneState<'a> {
    pub fb: &'a dyn ScanoutBuffer,
    /// Source size in pixels
    pub width: u32,
    pub height: u32,
}

/// One downstream output: the bridge chain head and what it drives
#[derive(Clone, Copy)]
pub struct Output<'a> {
    pub bridge: &'a dyn Bridge,
    pub connector: ConnectorInfo<'a>,
}

pub struct Commit<'a> {
    pub config: Configuration,
    pub plane: Option<PlaneState<'a>>,
    pub outputs: &'a [Output<'a>],
    pub event: Option<PendingEvent>,
}

/// The plane covers exactly the active area, in the configured format,
/// and fits in its buffer.
pub fn check_plane(config: &Configuration, plane: &PlaneState<'_>) -> Result<(), DisplayError> {
    let mode = &config.mode;
    if plane.width != mode.hdisplay || plane.height != mode.vdisplay {
        return Err(DisplayError::InvalidPlane);
    }
    if plane.fb.format() != config.format {
        return Err(DisplayError::InvalidPlane);
    }
    if !plane.fb.fits(plane.width, plane.height) {
        return Err(DisplayError::InvalidPlane);
    }
    Ok(())
}

impl<R, C, D> Display<R, C, D>
where
    R: RegisterIo,
    C: Clock,
    D: SlcdDma,
{
    /// Accept or reject `commit` without touching hardware.
    pub fn validate(&self, commit: &Commit<'_>) -> Result<(), DisplayError> {
        let crtc = self.crtc.lock();
        self.validate_locked(&crtc, commit)
    }

    /// Validate and apply `commit`.
    ///
    /// The completion event is delivered through [`events`](Self::events)
    /// at the next frame boundary, or immediately when the pipeline ends up
    /// off or the commit fails past validation.
    pub fn commit(&self, commit: &Commit<'_>) -> Result<(), DisplayError> {
        let mut crtc = self.crtc.lock();
        self.validate_locked(&crtc, commit)?;

        let result = self.commit_locked(&mut crtc, commit);
        if let Err(err) = result {
            log::error!("lcd: commit abandoned: {}", err);
            if let Some(event) = commit.event {
                self.vblank.send_now(event);
            }
        }
        result
    }

    fn validate_locked(&self, crtc: &Crtc, commit: &Commit<'_>) -> Result<(), DisplayError> {
        let config = &commit.config;
        if !config.active {
            return Ok(());
        }
        Crtc::validate(config, self.soc, &self.pix_clk)?;
        for output in commit.outputs {
            check_connector(&output.connector)?;
        }
        match &commit.plane {
            Some(plane) => check_plane(config, plane)?,
            // The descriptor length follows the mode and format
            None if crtc.needs_modeset(config) => {
                log::debug!("lcd: modeset without a primary plane");
                return Err(DisplayError::InvalidPlane);
            }
            None => {}
        }
        Ok(())
    }

    fn commit_locked(&self, crtc: &mut Crtc, commit: &Commit<'_>) -> Result<(), DisplayError> {
        let config = &commit.config;
        let modeset = crtc.needs_modeset(config);
        log::debug!(
            "lcd: commit {}x{} {:?} active={} modeset={}",
            config.mode.hdisplay,
            config.mode.vdisplay,
            config.format,
            config.active,
            modeset
        );

        if modeset && crtc.status() != CrtcStatus::Disabled {
            for output in commit.outputs {
                output.bridge.disable();
            }
            self.disable_vblank();
            crtc.disable(&self.regs, self.smart_refresh(), &self.timeouts)?;
            for output in commit.outputs {
                output.bridge.post_disable();
            }
        }

        if !config.active {
            if let Some(event) = commit.event {
                self.vblank.send_now(event);
            }
            return Ok(());
        }

        if modeset {
            for output in commit.outputs {
                crtc.encoder_mode_set(&self.regs, &config.mode, &output.connector);
                output.bridge.mode_set(&config.mode, &config.mode);
            }
        }

        if let Some(plane) = &commit.plane {
            self.update_plane(plane, config.format)?;
        }

        if modeset {
            self.select_panel_mode();
            crtc.apply_timing(&self.regs, &config.mode);
            crtc.apply_format(&self.regs, config.format);
            self.rate.mark_pending();
        }
        if !self.is_smart() {
            self.regs.write(regs::LCD_DA0, self.descriptor_phys());
        }

        if self.rate.is_pending() {
            if !modeset && crtc.is_active() {
                // Scanning out: let the current frame finish first
                if self.vblank.wait_one(self.timeouts.vblank_wait).is_err() {
                    log::warn!("lcd: no vblank before pixel clock update");
                }
            }
            let hz = config.pixel_clock_hz();
            self.rate.apply(&self.pix_clk, hz).map_err(|err| {
                log::error!("lcd: unable to set pixel clock to {} Hz: {}", hz, err);
                DisplayError::UnsupportedClockRate { hz }
            })?;
        }

        if modeset {
            for output in commit.outputs {
                output.bridge.pre_enable();
            }
            crtc.enable(&self.regs, self.smart_refresh(), &self.timeouts)?;
            self.enable_vblank();
            for output in commit.outputs {
                output.bridge.enable();
            }
        } else if let Some(refresh) = self.smart_refresh() {
            refresh.kick(refresh_interval(config.mode.vrefresh()));
        }

        if let Some(event) = commit.event {
            self.vblank.arm_or_send(event);
        }

        if self.vblank.is_on() && self.vblank.wait_one(self.timeouts.vblank_wait).is_err() {
            log::warn!("lcd: vblank wait timed out after commit");
        }
        Ok(())
    }

    /// Point the descriptor at the plane's buffer, with no smart-panel
    /// push in flight while it changes.
    fn update_plane(&self, plane: &PlaneState<'_>, format: PixelFormat) -> Result<(), DisplayError> {
        let addr = plane.fb.dma_addr();
        let rewrite = || {
            self.descriptor
                .lock(|desc| desc.borrow_mut().point_at_frame(addr, plane.width, plane.height, format))
        };
        match &self.refresh {
            Some(refresh) => refresh
                .quiesce(self.timeouts.refresh_cancel, rewrite)
                .map_err(DisplayError::HardwareTimeout),
            None => {
                rewrite();
                Ok(())
            }
        }
    }

    /// Smart mode needs both the strapping and a push channel.
    fn select_panel_mode(&self) {
        let strapped = read_panel_is_slcd(&self.regs);
        let smart = strapped && self.refresh.is_some();
        if strapped && !smart {
            log::warn!("lcd: smart panel strapped but no SLCD DMA, using continuous scanout");
        }
        self.panel_is_slcd.store(smart, core::sync::atomic::Ordering::Release);
    }
}
