//! Platform limits and driver tunables

use embassy_time::Duration;

/// DMA transfer unit of the descriptor length field, in bytes
pub const TRANSFER_GRANULARITY: usize = 4;

/// Fixed frame id placed in the descriptor (shows up in LCD_FID0)
pub const DESCRIPTOR_ID: u32 = 0xdeaf_bead;

/// Completion events waiting to be collected by the compositor
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// Parent-clock notifications waiting to be serviced
pub const CLOCK_QUEUE_DEPTH: usize = 4;

/// Refresh rate assumed when a mode's timing yields none
pub const FALLBACK_REFRESH_HZ: u32 = 60;

/// Per-SoC LCD controller description
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocInfo {
    pub name: &'static str,
    /// The controller has a separate device clock besides the pixel clock
    pub needs_dev_clk: bool,
    pub max_width: u32,
    pub max_height: u32,
}

pub const JZ4740: SocInfo = SocInfo {
    name: "jz4740",
    needs_dev_clk: true,
    max_width: 800,
    max_height: 600,
};

pub const JZ4725B: SocInfo = SocInfo {
    name: "jz4725b",
    needs_dev_clk: false,
    max_width: 800,
    max_height: 600,
};

pub const JZ4770: SocInfo = SocInfo {
    name: "jz4770",
    needs_dev_clk: false,
    max_width: 1280,
    max_height: 720,
};

impl SocInfo {
    /// Look up the controller from its device-tree compatible string
    pub fn from_compatible(compatible: &str) -> Option<&'static SocInfo> {
        match compatible {
            "ingenic,jz4740-lcd" => Some(&JZ4740),
            "ingenic,jz4725b-lcd" => Some(&JZ4725B),
            "ingenic,jz4770-lcd" => Some(&JZ4770),
            _ => None,
        }
    }
}

/// Polling intervals and wait bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Smart-panel "controller busy" poll interval
    pub slcd_busy_poll: Duration,
    /// Smart-panel quiesce bound before DMA enable
    pub slcd_busy_timeout: Duration,
    /// Poll interval while waiting for the controller to report DISABLED
    pub disable_poll: Duration,
    /// Caller deadline for the continuous-mode disable; `None` waits forever
    pub disable_deadline: Option<Duration>,
    /// Bound on any single wait for the next frame boundary
    pub vblank_wait: Duration,
    /// Bound on waiting for an in-flight smart-panel push to drain
    pub refresh_cancel: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            slcd_busy_poll: Duration::from_micros(4),
            slcd_busy_timeout: Duration::from_millis(100),
            disable_poll: Duration::from_millis(1),
            disable_deadline: Some(Duration::from_millis(100)),
            vblank_wait: Duration::from_millis(50),
            refresh_cancel: Duration::from_millis(100),
        }
    }
}
