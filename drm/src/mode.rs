//! Display modes, pixel formats and the per-commit configuration
//!
//! Timing fields follow the usual modeline convention: `*_sync_start`,
//! `*_sync_end` and `*_total` are positions counted from the first active
//! pixel/line, so `active <= sync_start <= sync_end <= total`.

use crate::device::{BusFlags, BusFormat, ConnectorInfo, ConnectorType};
use crate::error::DisplayError;
use crate::regs::LcdCfg;

bitflags::bitflags! {
    /// Mode polarity/scan flags
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ModeFlags: u32 {
        /// Horizontal sync active low
        const NHSYNC = 1 << 0;
        /// Vertical sync active low
        const NVSYNC = 1 << 1;
        const INTERLACE = 1 << 2;
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::empty()
    }
}

/// Video timing for one output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMode {
    /// Pixel clock in kHz
    pub clock_khz: u32,
    pub hdisplay: u32,
    pub hsync_start: u32,
    pub hsync_end: u32,
    pub htotal: u32,
    pub vdisplay: u32,
    pub vsync_start: u32,
    pub vsync_end: u32,
    pub vtotal: u32,
    pub flags: ModeFlags,
}

impl DisplayMode {
    /// Requested pixel clock in Hz
    pub fn pixel_clock_hz(&self) -> u64 {
        self.clock_khz as u64 * 1000
    }

    /// Vertical refresh rate in Hz, rounded to nearest
    pub fn vrefresh(&self) -> u32 {
        let pixels = self.htotal as u64 * self.vtotal as u64;
        if pixels == 0 {
            return 0;
        }
        ((self.pixel_clock_hz() + pixels / 2) / pixels) as u32
    }

    fn is_well_formed(&self) -> bool {
        self.hdisplay > 0
            && self.vdisplay > 0
            && self.hdisplay <= self.hsync_start
            && self.hsync_start <= self.hsync_end
            && self.hsync_end <= self.htotal
            && self.vdisplay <= self.vsync_start
            && self.vsync_start <= self.vsync_end
            && self.vsync_end <= self.vtotal
    }
}

/// Framebuffer pixel formats the primary plane accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 16-bit, 5 bits per channel (truncated color)
    Xrgb1555,
    /// 16-bit, 5-6-5
    Rgb565,
    /// 32-bit, 8 bits per channel
    Xrgb8888,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn cpp(&self) -> usize {
        match self {
            PixelFormat::Xrgb1555 | PixelFormat::Rgb565 => 2,
            PixelFormat::Xrgb8888 => 4,
        }
    }
}

/// A complete proposed CRTC configuration for one commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    pub mode: DisplayMode,
    pub format: PixelFormat,
    /// The pipeline should be scanning out after the commit
    pub active: bool,
    /// Timing/format changed: requires a full modeset
    pub mode_changed: bool,
}

impl Configuration {
    pub fn needs_modeset(&self) -> bool {
        self.mode_changed
    }

    /// Target pixel clock in Hz
    pub fn pixel_clock_hz(&self) -> u64 {
        self.mode.pixel_clock_hz()
    }
}

// =============================================================================
// Timing derivation
// =============================================================================

/// Register-level quantities for one scan direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisTiming {
    /// Sync pulse end
    pub pulse_end: u32,
    /// First active pixel/line
    pub data_start: u32,
    /// One past the last active pixel/line
    pub data_end: u32,
    /// Total period
    pub total: u32,
}

/// The controller counts from the start of the sync pulse, so blanking
/// before the pulse is folded behind the active area.
pub fn derive_axis(active: u32, sync_start: u32, sync_end: u32, total: u32) -> AxisTiming {
    let pulse_end = sync_end.wrapping_sub(sync_start);
    let data_start = total.wrapping_sub(sync_start);
    let data_end = data_start.wrapping_add(active);
    let total = data_end.wrapping_add(sync_start).wrapping_sub(active);
    AxisTiming { pulse_end, data_start, data_end, total }
}

/// Horizontal and vertical register timings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub h: AxisTiming,
    pub v: AxisTiming,
}

impl Timings {
    pub fn from_mode(mode: &DisplayMode) -> Self {
        Self {
            h: derive_axis(mode.hdisplay, mode.hsync_start, mode.hsync_end, mode.htotal),
            v: derive_axis(mode.vdisplay, mode.vsync_start, mode.vsync_end, mode.vtotal),
        }
    }
}

// =============================================================================
// Checks
// =============================================================================

/// Resolution and timing sanity against the platform limits
pub fn check_mode(mode: &DisplayMode, max_width: u32, max_height: u32) -> Result<(), DisplayError> {
    if !mode.is_well_formed() || mode.hdisplay > max_width || mode.vdisplay > max_height {
        return Err(DisplayError::UnsupportedResolution {
            width: mode.hdisplay,
            height: mode.vdisplay,
        });
    }
    Ok(())
}

/// Exactly one bus format, and one the controller can drive unless the
/// connector is a TV encoder.
pub fn check_connector(info: &ConnectorInfo<'_>) -> Result<(), DisplayError> {
    let [format] = info.bus_formats else {
        return Err(DisplayError::UnsupportedBusFormat);
    };
    if info.connector_type == ConnectorType::Tv {
        return Ok(());
    }
    match format {
        BusFormat::Rgb565_1x16
        | BusFormat::Rgb666_1x18
        | BusFormat::Rgb888_1x24
        | BusFormat::Rgb888_3x8 => Ok(()),
        BusFormat::Other(_) => Err(DisplayError::UnsupportedBusFormat),
    }
}

/// LCD_CFG contents for `mode` on the given connector (SLCD bit excluded).
pub fn panel_config(mode: &DisplayMode, info: &ConnectorInfo<'_>) -> LcdCfg {
    let sharp = info.bus_flags.contains(BusFlags::SHARP_SIGNALS);

    let mut cfg = if sharp {
        LcdCfg::MODE_SPECIAL_TFT_1 | LcdCfg::REV_POLARITY
    } else {
        LcdCfg::PS_DISABLE | LcdCfg::CLS_DISABLE | LcdCfg::SPL_DISABLE | LcdCfg::REV_DISABLE
    };

    if mode.flags.contains(ModeFlags::NHSYNC) {
        cfg |= LcdCfg::HSYNC_ACTIVE_LOW;
    }
    if mode.flags.contains(ModeFlags::NVSYNC) {
        cfg |= LcdCfg::VSYNC_ACTIVE_LOW;
    }
    if info.bus_flags.contains(BusFlags::DE_LOW) {
        cfg |= LcdCfg::DE_ACTIVE_LOW;
    }
    if info.bus_flags.contains(BusFlags::PIXDATA_NEGEDGE) {
        cfg |= LcdCfg::PCLK_FALLING_EDGE;
    }

    if !sharp {
        if info.connector_type == ConnectorType::Tv {
            if mode.flags.contains(ModeFlags::INTERLACE) {
                cfg |= LcdCfg::MODE_TV_OUT_I;
            } else {
                cfg |= LcdCfg::MODE_TV_OUT_P;
            }
        } else {
            match info.bus_formats.first() {
                Some(BusFormat::Rgb565_1x16) => cfg |= LcdCfg::MODE_GENERIC_16BIT,
                Some(BusFormat::Rgb666_1x18) => cfg |= LcdCfg::MODE_GENERIC_18BIT,
                Some(BusFormat::Rgb888_1x24) => cfg |= LcdCfg::MODE_GENERIC_24BIT,
                Some(BusFormat::Rgb888_3x8) => cfg |= LcdCfg::MODE_8BIT_SERIAL,
                _ => {}
            }
        }
    }

    cfg
}
