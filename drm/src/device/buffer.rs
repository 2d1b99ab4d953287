//! Framebuffer capability

use super::dma::DmaAddr;
use crate::mode::PixelFormat;

/// A buffer object that can be scanned out.
pub trait ScanoutBuffer: Send + Sync {
    /// Bus address of the first pixel
    fn dma_addr(&self) -> DmaAddr;

    /// Allocated size in bytes
    fn byte_len(&self) -> usize;

    fn format(&self) -> PixelFormat;

    /// Whether a `width`×`height` frame in this buffer's format fits
    fn fits(&self, width: u32, height: u32) -> bool {
        width as usize * height as usize * self.format().cpp() <= self.byte_len()
    }
}
