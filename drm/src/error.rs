//! Error types reported by the display core

use core::fmt;

use crate::device::{ClockError, DmaError};

/// Which bounded wait expired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    /// Smart-panel controller stayed busy
    Enable,
    /// Controller never reported DISABLED
    Disable,
    /// No frame boundary arrived
    Vblank,
    /// An in-flight smart-panel push did not drain
    RefreshCancel,
}

/// Reasons a commit is rejected or abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// Active area exceeds the platform limits
    UnsupportedResolution { width: u32, height: u32 },
    /// The pixel clock cannot produce this rate
    UnsupportedClockRate { hz: u64 },
    /// The connector's bus format cannot be driven
    UnsupportedBusFormat,
    /// Plane does not match the mode, format or buffer
    InvalidPlane,
    /// Hardware did not reach the expected state in time
    HardwareTimeout(TimeoutKind),
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayError::UnsupportedResolution { width, height } => {
                write!(f, "unsupported resolution {}x{}", width, height)
            }
            DisplayError::UnsupportedClockRate { hz } => {
                write!(f, "unsupported pixel clock {} Hz", hz)
            }
            DisplayError::UnsupportedBusFormat => write!(f, "unsupported bus format"),
            DisplayError::InvalidPlane => write!(f, "invalid plane state"),
            DisplayError::HardwareTimeout(kind) => write!(f, "hardware timeout ({:?})", kind),
        }
    }
}

/// Device attach failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachError {
    MissingPixelClock,
    /// The SoC needs a device clock and none was provided
    MissingDeviceClock,
    /// Descriptor memory too small or misaligned
    DescriptorMemory,
    Clock(ClockError),
    Dma(DmaError),
}

impl From<ClockError> for AttachError {
    fn from(err: ClockError) -> Self {
        AttachError::Clock(err)
    }
}

impl From<DmaError> for AttachError {
    fn from(err: DmaError) -> Self {
        AttachError::Dma(err)
    }
}

impl fmt::Display for AttachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::MissingPixelClock => write!(f, "failed to get pixel clock"),
            AttachError::MissingDeviceClock => write!(f, "failed to get lcd clock"),
            AttachError::DescriptorMemory => write!(f, "unable to allocate DMA descriptor"),
            AttachError::Clock(err) => write!(f, "clock: {}", err),
            AttachError::Dma(err) => write!(f, "dma: {}", err),
        }
    }
}
