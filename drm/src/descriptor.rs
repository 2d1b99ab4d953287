//! Scanout DMA descriptor
//!
//! The controller keeps a pointer to a single descriptor for the lifetime of
//! the device. It is never replaced, only rewritten in place: `next` points
//! back at the descriptor itself so continuous scanout loops on one buffer.
//! It lives in coherent memory supplied by the platform, so a volatile
//! store followed by a fence is all the controller needs to see an update.

use core::mem::{align_of, size_of};
use core::ptr::{addr_of, addr_of_mut, read_volatile, write_volatile, NonNull};
use core::sync::atomic::{fence, Ordering};

use crate::config::{DESCRIPTOR_ID, TRANSFER_GRANULARITY};
use crate::device::{CoherentRegion, DmaAddr};
use crate::mode::PixelFormat;
use crate::regs::LcdCmd;

/// Hardware layout of an LCD DMA descriptor
#[repr(C, align(16))]
struct HwDesc {
    next: u32,
    addr: u32,
    id: u32,
    cmd: u32,
}

/// Command word for a transfer of `byte_len` bytes with end-of-frame IRQ.
pub fn command_word(byte_len: usize) -> u32 {
    let units = byte_len.div_ceil(TRANSFER_GRANULARITY) as u32;
    (units & LcdCmd::LENGTH_MASK.bits()) | LcdCmd::EOF_IRQ.bits()
}

/// Owner of the device's hardware-visible descriptor
pub struct DescriptorManager {
    desc: NonNull<HwDesc>,
    phys: DmaAddr,
    /// Number of `point_at` rewrites since attach
    updates: u32,
}

// The descriptor region is owned exclusively; writes need &mut self.
unsafe impl Send for DescriptorManager {}

impl DescriptorManager {
    /// Lay the descriptor out in `region` and link it to itself.
    ///
    /// Returns `None` when the region is too small or misaligned for the
    /// controller.
    pub fn new(region: CoherentRegion) -> Option<Self> {
        let align = align_of::<HwDesc>();
        let cpu = region.cpu_ptr();
        let phys = region.bus_addr();
        if region.len() < size_of::<HwDesc>()
            || cpu.as_ptr() as usize % align != 0
            || phys as usize % align != 0
        {
            log::error!(
                "lcd: descriptor region 0x{:08x} ({} bytes) unusable",
                phys,
                region.len()
            );
            return None;
        }

        let mgr = Self { desc: cpu.cast(), phys, updates: 0 };
        let desc = mgr.desc.as_ptr();
        unsafe {
            write_volatile(addr_of_mut!((*desc).next), phys);
            write_volatile(addr_of_mut!((*desc).addr), 0);
            write_volatile(addr_of_mut!((*desc).id), DESCRIPTOR_ID);
            write_volatile(addr_of_mut!((*desc).cmd), 0);
        }
        fence(Ordering::SeqCst);
        Some(mgr)
    }

    /// Bus address of the descriptor itself
    pub fn phys_addr(&self) -> DmaAddr {
        self.phys
    }

    /// Point the descriptor at a new scanout buffer.
    ///
    /// Address and length are written back to back and fenced before the
    /// descriptor can be fetched again.
    pub fn point_at(&mut self, buffer: DmaAddr, byte_len: usize) {
        let cmd = command_word(byte_len);
        let desc = self.desc.as_ptr();
        unsafe {
            write_volatile(addr_of_mut!((*desc).addr), buffer);
            write_volatile(addr_of_mut!((*desc).cmd), cmd);
        }
        fence(Ordering::SeqCst);
        self.updates = self.updates.wrapping_add(1);
        log::trace!("lcd: descriptor -> 0x{:08x}, cmd 0x{:08x}", buffer, cmd);
    }

    /// Point at a `width`×`height` frame in `format`.
    pub fn point_at_frame(&mut self, buffer: DmaAddr, width: u32, height: u32, format: PixelFormat) {
        let byte_len = width as usize * height as usize * format.cpp();
        self.point_at(buffer, byte_len);
    }

    pub fn next(&self) -> DmaAddr {
        unsafe { read_volatile(addr_of!((*self.desc.as_ptr()).next)) }
    }

    /// Current scanout buffer address
    pub fn buffer(&self) -> DmaAddr {
        unsafe { read_volatile(addr_of!((*self.desc.as_ptr()).addr)) }
    }

    pub fn id(&self) -> u32 {
        unsafe { read_volatile(addr_of!((*self.desc.as_ptr()).id)) }
    }

    pub fn command(&self) -> u32 {
        unsafe { read_volatile(addr_of!((*self.desc.as_ptr()).cmd)) }
    }

    /// Transfer length encoded in the command word, in bytes
    pub fn transfer_len(&self) -> usize {
        (self.command() & LcdCmd::LENGTH_MASK.bits()) as usize * TRANSFER_GRANULARITY
    }

    pub fn update_count(&self) -> u32 {
        self.updates
    }
}
