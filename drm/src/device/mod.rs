//! Capabilities consumed by the display core
//!
//! Everything the core needs from the rest of the kernel is expressed as a
//! trait here, so the same code drives real JZ47xx hardware and the
//! simulated devices used by the tests.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │          Compositor / window system          │
//! └──────────────────────┬───────────────────────┘
//!                        │ validate / commit / vblank / irq
//! ┌──────────────────────┴───────────────────────┐
//! │                Display core                  │
//! └───┬──────────┬───────────┬──────────┬────────┘
//!     │          │           │          │
//! RegisterIo   Clock      SlcdDma    Bridge
//! (LCD MMIO)  (pixclk)  (SLCD push)  (panel)
//! ```

pub mod bridge;
pub mod buffer;
pub mod clock;
pub mod dma;
pub mod regmap;

pub use bridge::{Bridge, BusFlags, BusFormat, ConnectorInfo, ConnectorType};
pub use buffer::ScanoutBuffer;
pub use clock::{Clock, ClockError};
pub use dma::{kseg_to_phys, BusWidth, CoherentRegion, DmaAddr, DmaError, NoSlcdDma, SlaveConfig, SlcdDma};
pub use regmap::{read_poll_timeout, Mmio, PollTimeout, RegisterIo};
