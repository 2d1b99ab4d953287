//! DMA capability for smart-panel pushes

use core::fmt;
use core::ptr::NonNull;

/// Bus address as seen by the LCD controller and the DMA engine
pub type DmaAddr = u32;

/// Strip the MIPS KSEG0/KSEG1 segment bits from a kernel virtual address.
#[inline]
pub fn kseg_to_phys(virt: usize) -> DmaAddr {
    (virt as u32) & 0x1FFF_FFFF
}

/// Uncached kernel segment
const KSEG1_BASE: usize = 0xA000_0000;

/// Memory the controller fetches from with no CPU cache in between.
///
/// Stores through [`cpu_ptr`](Self::cpu_ptr) reach memory without cache
/// maintenance, either because the mapping is uncached (KSEG1) or because
/// the platform allocated it coherent. [`bus_addr`](Self::bus_addr) is
/// where the controller sees the same bytes.
#[derive(Debug)]
pub struct CoherentRegion {
    cpu: NonNull<u8>,
    bus: DmaAddr,
    len: usize,
}

// The region is handed over whole; only its owner touches it.
unsafe impl Send for CoherentRegion {}

impl CoherentRegion {
    /// # Safety
    ///
    /// `cpu` must be valid for reads and writes of `len` bytes for as long
    /// as the region is in use, must not be accessed through any other
    /// pointer meanwhile, and must map the memory the controller reaches
    /// at `bus` without a write-back cache.
    pub const unsafe fn new(cpu: NonNull<u8>, bus: DmaAddr, len: usize) -> Self {
        Self { cpu, bus, len }
    }

    /// Uncached KSEG1 alias of a buffer at KSEG0 address `kseg0`.
    ///
    /// # Safety
    ///
    /// MIPS32 kernels only. The buffer must be owned by the caller for the
    /// region's lifetime, and its cached lines must not be written back
    /// over the region afterwards (flush or invalidate it first).
    pub unsafe fn from_kseg0(kseg0: usize, len: usize) -> Option<Self> {
        let bus = kseg_to_phys(kseg0);
        let cpu = NonNull::new((KSEG1_BASE | bus as usize) as *mut u8)?;
        Some(unsafe { Self::new(cpu, bus, len) })
    }

    pub fn cpu_ptr(&self) -> NonNull<u8> {
        self.cpu
    }

    pub fn bus_addr(&self) -> DmaAddr {
        self.bus
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BusWidth {
    Byte = 1,
    HalfWord = 2,
    Word = 4,
}

/// Memory-to-device slave channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Device FIFO address
    pub dst_addr: DmaAddr,
    pub src_width: BusWidth,
    pub dst_width: BusWidth,
    pub src_maxburst: u32,
    pub dst_maxburst: u32,
}

/// DMA engine errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaError {
    /// Channel rejected the slave configuration
    Config,
    /// Transfer descriptor could not be prepared
    Prepare,
    /// Channel is still running a transfer
    Busy,
}

impl fmt::Display for DmaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DmaError::Config => write!(f, "unable to configure DMA"),
            DmaError::Prepare => write!(f, "unable to prepare DMA"),
            DmaError::Busy => write!(f, "DMA channel busy"),
        }
    }
}

/// Single-shot memory-to-device channel feeding the smart-panel FIFO.
///
/// When a transfer submitted with [`push_single`](SlcdDma::push_single)
/// finishes, the DMA engine's completion handler must call
/// [`Display::handle_push_complete`](crate::Display::handle_push_complete).
pub trait SlcdDma: Send + Sync {
    fn configure(&self, config: &SlaveConfig) -> Result<(), DmaError>;

    /// Prepare, submit and issue a transfer of `len` bytes from `src`.
    fn push_single(&self, src: DmaAddr, len: usize) -> Result<(), DmaError>;
}

/// Channel type for controllers wired without a smart-panel DMA channel
#[derive(Debug)]
pub enum NoSlcdDma {}

impl SlcdDma for NoSlcdDma {
    fn configure(&self, _config: &SlaveConfig) -> Result<(), DmaError> {
        match *self {}
    }

    fn push_single(&self, _src: DmaAddr, _len: usize) -> Result<(), DmaError> {
        match *self {}
    }
}
