//! Clock capability

use core::fmt;

/// Clock framework errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    /// No achievable rate near the requested one
    UnsupportedRate,
    /// The clock could not be gated on
    EnableFailed,
    /// The rate change was refused (e.g. locked by another consumer)
    Busy,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::UnsupportedRate => write!(f, "unsupported clock rate"),
            ClockError::EnableFailed => write!(f, "clock enable failed"),
            ClockError::Busy => write!(f, "clock busy"),
        }
    }
}

/// A gateable, rate-controllable clock.
///
/// Rates are in Hz. Parent rate-change notifications are not delivered
/// through this trait; the clock framework forwards them to
/// [`Display::clock_notify`](crate::Display::clock_notify).
pub trait Clock: Send + Sync {
    fn enable(&self) -> Result<(), ClockError>;

    fn disable(&self);

    /// Current rate
    fn rate(&self) -> u64;

    /// The closest rate the hardware can produce for `hz`
    fn round_rate(&self, hz: u64) -> Result<u64, ClockError>;

    fn set_rate(&self, hz: u64) -> Result<(), ClockError>;

    /// Current rate of the parent clock
    fn parent_rate(&self) -> u64;
}
