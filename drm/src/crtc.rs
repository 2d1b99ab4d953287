//! Pipeline state machine: timing, format, enable and disable
//!
//! `Disabled → Enabling → Active → Disabling → Disabled`. Every transition
//! runs its register sequence to completion (or to its timeout) before
//! returning. A timed-out transition is not rolled back; the status names
//! the state the hardware was left in.

use crate::config::{SocInfo, Timeouts};
use crate::device::{read_poll_timeout, BusFlags, Clock, ConnectorInfo, RegisterIo, SlcdDma};
use crate::error::{DisplayError, TimeoutKind};
use crate::mode::{check_mode, panel_config, Configuration, DisplayMode, PixelFormat, Timings};
use crate::refresh::{refresh_interval, RefreshScheduler};
use crate::regs::{self, LcdCfg, LcdCtrl, LcdState, SlcdCtrl, SlcdState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrtcStatus {
    Disabled,
    Enabling,
    Active,
    Disabling,
}

/// Bits `apply_format` owns in LCD_CTRL
const FORMAT_MASK: LcdCtrl = LcdCtrl::OFUP
    .union(LcdCtrl::BURST_MASK)
    .union(LcdCtrl::RGB555)
    .union(LcdCtrl::BPP_MASK);

pub struct Crtc {
    status: CrtcStatus,
    /// Panel needs the Sharp PS/CLS/SPL/REV timings
    sharp: bool,
    mode: Option<DisplayMode>,
    format: Option<PixelFormat>,
}

impl Crtc {
    pub const fn new() -> Self {
        Self {
            status: CrtcStatus::Disabled,
            sharp: false,
            mode: None,
            format: None,
        }
    }

    pub fn status(&self) -> CrtcStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status == CrtcStatus::Active
    }

    /// Mode last written to the timing registers
    #[cfg(test)]
    pub fn mode(&self) -> Option<&DisplayMode> {
        self.mode.as_ref()
    }

    #[cfg(test)]
    pub fn is_sharp(&self) -> bool {
        self.sharp
    }

    /// Whether reaching `config` takes a full disable, program and enable
    /// cycle: the caller asked for one, the pipeline changes on/off, or the
    /// timing or format registers hold something else.
    pub fn needs_modeset(&self, config: &Configuration) -> bool {
        if config.needs_modeset() || config.active != self.is_active() {
            return true;
        }
        config.active && (self.mode != Some(config.mode) || self.format != Some(config.format))
    }

    /// Check `config` against the platform limits and the pixel clock.
    ///
    /// Touches no hardware and no state; safe to call speculatively.
    pub fn validate<C: Clock + ?Sized>(config: &Configuration, soc: &SocInfo, pix_clk: &C) -> Result<(), DisplayError> {
        check_mode(&config.mode, soc.max_width, soc.max_height)?;
        let hz = config.pixel_clock_hz();
        pix_clk
            .round_rate(hz)
            .map_err(|_| DisplayError::UnsupportedClockRate { hz })?;
        Ok(())
    }

    /// Panel configuration for one output (encoder mode-set).
    ///
    /// The read-only SLCD bit of LCD_CFG is preserved.
    pub fn encoder_mode_set<R: RegisterIo + ?Sized>(&mut self, regs: &R, mode: &DisplayMode, info: &ConnectorInfo<'_>) {
        let cfg = panel_config(mode, info);
        self.sharp = info.bus_flags.contains(BusFlags::SHARP_SIGNALS);
        regs.update_bits(regs::LCD_CFG, !LcdCfg::SLCD.bits(), cfg.bits());
    }

    pub fn apply_timing<R: RegisterIo + ?Sized>(&mut self, regs: &R, mode: &DisplayMode) {
        let Timings { h, v } = Timings::from_mode(mode);

        regs.write(regs::LCD_VSYNC, v.pulse_end << regs::VSYNC_VPE_OFFSET);
        regs.write(regs::LCD_HSYNC, h.pulse_end << regs::HSYNC_HPE_OFFSET);
        regs.write(regs::LCD_VAT, (h.total << regs::VAT_HT_OFFSET) | (v.total << regs::VAT_VT_OFFSET));
        regs.write(regs::LCD_DAH, (h.data_start << regs::DAH_HDS_OFFSET) | (h.data_end << regs::DAH_HDE_OFFSET));
        regs.write(regs::LCD_DAV, (v.data_start << regs::DAV_VDS_OFFSET) | (v.data_end << regs::DAV_VDE_OFFSET));

        if self.sharp {
            regs.write(regs::LCD_PS, (h.data_end << 16) | (h.data_end + 1));
            regs.write(regs::LCD_CLS, (h.data_end << 16) | (h.data_end + 1));
            regs.write(regs::LCD_SPL, (h.pulse_end << 16) | (h.pulse_end + 1));
            regs.write(regs::LCD_REV, mode.htotal << 16);
        }

        log::debug!(
            "lcd: timing {}x{} ht={} vt={} hds={} hde={}",
            mode.hdisplay,
            mode.vdisplay,
            h.total,
            v.total,
            h.data_start,
            h.data_end
        );
        self.mode = Some(*mode);
    }

    pub fn apply_format<R: RegisterIo + ?Sized>(&mut self, regs: &R, format: PixelFormat) {
        let mut ctrl = LcdCtrl::OFUP | LcdCtrl::BURST_16;
        ctrl |= match format {
            PixelFormat::Xrgb1555 => LcdCtrl::RGB555 | LcdCtrl::BPP_15_16,
            PixelFormat::Rgb565 => LcdCtrl::BPP_15_16,
            PixelFormat::Xrgb8888 => LcdCtrl::BPP_18_24,
        };
        regs.update_bits(regs::LCD_CTRL, FORMAT_MASK.bits(), ctrl.bits());
        self.format = Some(format);
    }

    /// Start scanout.
    ///
    /// `smart` carries the refresh scheduler when the panel is in command
    /// mode; the first push is requested once DMA is enabled.
    pub fn enable<R, D>(&mut self, regs: &R, smart: Option<&RefreshScheduler<D>>, timeouts: &Timeouts) -> Result<(), DisplayError>
    where
        R: RegisterIo + ?Sized,
        D: SlcdDma,
    {
        self.status = CrtcStatus::Enabling;
        regs.write(regs::LCD_STATE, 0);

        match smart {
            Some(refresh) => {
                let idle = read_poll_timeout(
                    regs,
                    regs::SLCD_MSTATE,
                    |v| !SlcdState::from_bits_retain(v).contains(SlcdState::BUSY),
                    timeouts.slcd_busy_poll,
                    Some(timeouts.slcd_busy_timeout),
                );
                if idle.is_err() {
                    log::error!("lcd: CRTC enable timeout");
                    self.status = CrtcStatus::Disabled;
                    return Err(DisplayError::HardwareTimeout(TimeoutKind::Enable));
                }
                regs.update_bits(regs::SLCD_MCTRL, SlcdCtrl::DMATXEN.bits(), SlcdCtrl::DMATXEN.bits());
                let vrefresh = self.mode.map_or(0, |m| m.vrefresh());
                refresh.kick(refresh_interval(vrefresh));
            }
            None => {
                regs.update_bits(
                    regs::LCD_CTRL,
                    (LcdCtrl::ENABLE | LcdCtrl::DISABLE).bits(),
                    LcdCtrl::ENABLE.bits(),
                );
            }
        }

        self.status = CrtcStatus::Active;
        log::debug!("lcd: pipeline enabled");
        Ok(())
    }

    /// Stop scanout and wait until the controller has stopped.
    ///
    /// In command mode this stops the refresh chain and waits for an
    /// in-flight push instead of touching the controller.
    pub fn disable<R, D>(&mut self, regs: &R, smart: Option<&RefreshScheduler<D>>, timeouts: &Timeouts) -> Result<(), DisplayError>
    where
        R: RegisterIo + ?Sized,
        D: SlcdDma,
    {
        self.status = CrtcStatus::Disabling;

        match smart {
            Some(refresh) => {
                refresh
                    .cancel_sync(timeouts.refresh_cancel)
                    .map_err(DisplayError::HardwareTimeout)?;
            }
            None => {
                regs.update_bits(regs::LCD_CTRL, LcdCtrl::DISABLE.bits(), LcdCtrl::DISABLE.bits());
                let stopped = read_poll_timeout(
                    regs,
                    regs::LCD_STATE,
                    |v| LcdState::from_bits_retain(v).contains(LcdState::DISABLED),
                    timeouts.disable_poll,
                    timeouts.disable_deadline,
                );
                if let Err(timeout) = stopped {
                    log::error!("lcd: CRTC disable timeout (state 0x{:08x})", timeout.last);
                    return Err(DisplayError::HardwareTimeout(TimeoutKind::Disable));
                }
            }
        }

        self.status = CrtcStatus::Disabled;
        log::debug!("lcd: pipeline disabled");
        Ok(())
    }
}

impl Default for Crtc {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether the controller was strapped for a smart (command-mode) panel
pub fn read_panel_is_slcd<R: RegisterIo + ?Sized>(regs: &R) -> bool {
    LcdCfg::from_bits_retain(regs.read(regs::LCD_CFG)).contains(LcdCfg::SLCD)
}
