//! Display core for the Ingenic JZ47xx LCD controller
//!
//! Drives one scanout pipeline: a self-linked DMA descriptor feeding either
//! a continuously streaming panel or a smart (command-mode) panel refreshed
//! by explicit DMA pushes. The compositor talks to [`Display`] through
//! `validate`/`commit` and collects completion events; the platform wires
//! the LCD interrupt, the DMA completion callback and parent-clock
//! notifications to the matching hooks.

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod device;
pub mod regs;

mod commit;
mod crtc;
mod descriptor;
mod display;
mod error;
mod mode;
mod pixclk;
mod refresh;
mod vblank;

#[cfg(test)]
mod mock;

pub use commit::{check_plane, Commit, Output, PlaneState};
pub use config::{SocInfo, Timeouts};
pub use crtc::CrtcStatus;
pub use descriptor::{command_word, DescriptorManager};
pub use display::{Display, Resources};
pub use error::{AttachError, DisplayError, TimeoutKind};
pub use mode::{derive_axis, AxisTiming, Configuration, DisplayMode, ModeFlags, PixelFormat, Timings};
pub use pixclk::ClockNotification;
pub use refresh::RefreshScheduler;
pub use vblank::{CompletedEvent, PendingEvent};
