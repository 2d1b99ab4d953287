//! Bridge/panel capability and connector description

use crate::mode::DisplayMode;

/// Kind of connector at the end of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorType {
    /// Parallel RGB panel
    Dpi,
    /// Composite/TV encoder
    Tv,
}

/// Media bus format advertised by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFormat {
    Rgb565_1x16,
    Rgb666_1x18,
    Rgb888_1x24,
    /// 24-bit RGB sent as three 8-bit serial cycles
    Rgb888_3x8,
    /// Any format this controller cannot drive (raw media-bus code)
    Other(u32),
}

bitflags::bitflags! {
    /// Signal conventions required by the connected panel
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct BusFlags: u32 {
        /// Data-enable is active low
        const DE_LOW = 1 << 0;
        /// Data is driven on the falling pixel-clock edge
        const PIXDATA_NEGEDGE = 1 << 1;
        /// Panel needs the Sharp PS/CLS/SPL/REV signals
        const SHARP_SIGNALS = 1 << 2;
    }
}

impl Default for BusFlags {
    fn default() -> Self {
        BusFlags::empty()
    }
}

/// What the display core needs to know about a connector
#[derive(Debug, Clone, Copy)]
pub struct ConnectorInfo<'a> {
    pub connector_type: ConnectorType,
    pub bus_formats: &'a [BusFormat],
    pub bus_flags: BusFlags,
}

/// Signal-conditioning stage between the controller and the panel.
///
/// Callbacks run from the commit path and may sleep. Disable order is
/// `disable` → (pipeline off) → `post_disable`; enable order is
/// `pre_enable` → (pipeline on) → `enable`.
pub trait Bridge: Send + Sync {
    fn pre_enable(&self) {}

    fn enable(&self) {}

    fn disable(&self) {}

    fn post_disable(&self) {}

    fn mode_set(&self, _mode: &DisplayMode, _adjusted: &DisplayMode) {}
}
