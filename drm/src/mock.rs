//! Simulated controller, clock, DMA channel and bridges for unit tests
//!
//! Every fake is a cheap `Clone` over shared state so a test keeps a handle
//! after moving one into a `Display`. Fakes built with a shared [`Trace`]
//! record into one global ordering, which is what the sequencing tests
//! assert on.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::boxed::Box;
use std::ptr::NonNull;
use std::sync::{Arc, Mutex};
use std::vec::Vec;

use crate::device::{kseg_to_phys, Bridge, Clock, ClockError, CoherentRegion, DmaAddr, DmaError, RegisterIo, ScanoutBuffer, SlaveConfig, SlcdDma};
use crate::mode::{DisplayMode, ModeFlags, PixelFormat};
use crate::regs::{self, LcdCtrl, LcdState};

/// One observable side effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Write(usize, u32),
    SetRate(u64),
    Push(DmaAddr, usize),
    Bridge(&'static str, &'static str),
}

#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<Op>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, op: Op) {
        self.0.lock().unwrap().push(op);
    }

    pub fn ops(&self) -> Vec<Op> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    /// Index of the first recorded op matching `pred`
    pub fn position(&self, pred: impl Fn(&Op) -> bool) -> Option<usize> {
        self.0.lock().unwrap().iter().position(|op| pred(op))
    }

    pub fn bridge_calls(&self) -> Vec<(&'static str, &'static str)> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Bridge(name, call) => Some((name, call)),
                _ => None,
            })
            .collect()
    }
}

// =============================================================================
// Register file
// =============================================================================

const REG_COUNT: usize = regs::LCD_MAX_REGISTER / 4 + 1;

struct RegFile {
    values: [u32; REG_COUNT],
    writes: Vec<(usize, u32)>,
}

/// LCD register window with the side effects the core relies on:
/// setting CTRL.DISABLE raises STATE.DISABLED, setting CTRL.ENABLE
/// clears it.
#[derive(Clone)]
pub struct FakeRegs {
    file: Arc<Mutex<RegFile>>,
    stuck_disable: Arc<AtomicBool>,
    trace: Trace,
}

impl FakeRegs {
    pub fn new() -> Self {
        Self::with_trace(Trace::new())
    }

    pub fn with_trace(trace: Trace) -> Self {
        let mut values = [0; REG_COUNT];
        values[regs::LCD_STATE / 4] = LcdState::DISABLED.bits();
        Self {
            file: Arc::new(Mutex::new(RegFile { values, writes: Vec::new() })),
            stuck_disable: Arc::new(AtomicBool::new(false)),
            trace,
        }
    }

    /// Set a register as the hardware would, without recording a write
    pub fn set(&self, offset: usize, value: u32) {
        self.file.lock().unwrap().values[offset / 4] = value;
    }

    pub fn get(&self, offset: usize) -> u32 {
        self.file.lock().unwrap().values[offset / 4]
    }

    /// Number of software writes to `offset`
    pub fn writes_to(&self, offset: usize) -> usize {
        self.file.lock().unwrap().writes.iter().filter(|(off, _)| *off == offset).count()
    }

    pub fn last_write(&self, offset: usize) -> Option<u32> {
        let file = self.file.lock().unwrap();
        file.writes.iter().rev().find(|(off, _)| *off == offset).map(|(_, v)| *v)
    }

    /// The controller ignores disable requests from now on
    pub fn stick_disable(&self) {
        self.stuck_disable.store(true, Ordering::SeqCst);
    }

    pub fn set_slcd_busy(&self, busy: bool) {
        self.set(regs::SLCD_MSTATE, busy as u32);
    }

    /// Latch an end-of-frame interrupt in STATE
    pub fn raise_eof(&self) {
        let mut file = self.file.lock().unwrap();
        file.values[regs::LCD_STATE / 4] |= LcdState::EOF_IRQ.bits();
    }
}

impl RegisterIo for FakeRegs {
    fn read(&self, offset: usize) -> u32 {
        self.get(offset)
    }

    fn write(&self, offset: usize, value: u32) {
        self.store(&mut self.file.lock().unwrap(), offset, value);
    }

    // Read-modify-write under one lock, like a locked regmap
    fn update_bits(&self, offset: usize, mask: u32, value: u32) {
        let mut file = self.file.lock().unwrap();
        let old = file.values[offset / 4];
        let new = (old & !mask) | (value & mask);
        if new != old {
            self.store(&mut file, offset, new);
        }
    }
}

impl FakeRegs {
    fn store(&self, file: &mut RegFile, offset: usize, value: u32) {
        assert!(regs::is_writeable(offset), "write to read-only register 0x{:02x}", offset);
        file.writes.push((offset, value));
        file.values[offset / 4] = value;

        if offset == regs::LCD_CTRL {
            let ctrl = LcdCtrl::from_bits_retain(value);
            let state = &mut file.values[regs::LCD_STATE / 4];
            if ctrl.contains(LcdCtrl::DISABLE) {
                if !self.stuck_disable.load(Ordering::SeqCst) {
                    *state |= LcdState::DISABLED.bits();
                }
            } else if ctrl.contains(LcdCtrl::ENABLE) {
                *state &= !LcdState::DISABLED.bits();
            }
        }
        self.trace.record(Op::Write(offset, value));
    }
}

// =============================================================================
// Clock
// =============================================================================

struct ClockInner {
    rate: AtomicU64,
    parent: u64,
    max_rate: AtomicU64,
    enabled: AtomicBool,
    fail_set: AtomicBool,
    fail_enable: AtomicBool,
    rates: Mutex<Vec<u64>>,
}

#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<ClockInner>,
    trace: Trace,
}

impl FakeClock {
    pub fn new(parent: u64) -> Self {
        Self::with_trace(parent, Trace::new())
    }

    pub fn with_trace(parent: u64, trace: Trace) -> Self {
        Self {
            inner: Arc::new(ClockInner {
                rate: AtomicU64::new(0),
                parent,
                max_rate: AtomicU64::new(parent),
                enabled: AtomicBool::new(false),
                fail_set: AtomicBool::new(false),
                fail_enable: AtomicBool::new(false),
                rates: Mutex::new(Vec::new()),
            }),
            trace,
        }
    }

    /// Highest rate `round_rate` accepts
    pub fn set_max_rate(&self, hz: u64) {
        self.inner.max_rate.store(hz, Ordering::SeqCst);
    }

    pub fn fail_next_set(&self) {
        self.inner.fail_set.store(true, Ordering::SeqCst);
    }

    pub fn fail_enable(&self) {
        self.inner.fail_enable.store(true, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Every successful `set_rate`, in order
    pub fn set_rates(&self) -> Vec<u64> {
        self.inner.rates.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn enable(&self) -> Result<(), ClockError> {
        if self.inner.fail_enable.load(Ordering::SeqCst) {
            return Err(ClockError::EnableFailed);
        }
        self.inner.enabled.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&self) {
        self.inner.enabled.store(false, Ordering::SeqCst);
    }

    fn rate(&self) -> u64 {
        self.inner.rate.load(Ordering::SeqCst)
    }

    fn round_rate(&self, hz: u64) -> Result<u64, ClockError> {
        if hz == 0 || hz > self.inner.max_rate.load(Ordering::SeqCst) {
            return Err(ClockError::UnsupportedRate);
        }
        Ok(hz)
    }

    fn set_rate(&self, hz: u64) -> Result<(), ClockError> {
        if self.inner.fail_set.swap(false, Ordering::SeqCst) {
            return Err(ClockError::Busy);
        }
        self.inner.rates.lock().unwrap().push(hz);
        self.inner.rate.store(hz, Ordering::SeqCst);
        self.trace.record(Op::SetRate(hz));
        Ok(())
    }

    fn parent_rate(&self) -> u64 {
        self.inner.parent
    }
}

// =============================================================================
// Smart-panel DMA
// =============================================================================

struct DmaInner {
    config: Mutex<Option<SlaveConfig>>,
    pushes: Mutex<Vec<(DmaAddr, usize)>>,
    fail_next: AtomicBool,
    reject_config: AtomicBool,
}

#[derive(Clone)]
pub struct FakeDma {
    inner: Arc<DmaInner>,
    trace: Trace,
}

impl FakeDma {
    pub fn new() -> Self {
        Self::with_trace(Trace::new())
    }

    pub fn with_trace(trace: Trace) -> Self {
        Self {
            inner: Arc::new(DmaInner {
                config: Mutex::new(None),
                pushes: Mutex::new(Vec::new()),
                fail_next: AtomicBool::new(false),
                reject_config: AtomicBool::new(false),
            }),
            trace,
        }
    }

    /// The next push fails to prepare
    pub fn fail_next(&self) {
        self.inner.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn reject_config(&self) {
        self.inner.reject_config.store(true, Ordering::SeqCst);
    }

    pub fn config(&self) -> Option<SlaveConfig> {
        *self.inner.config.lock().unwrap()
    }

    pub fn pushes(&self) -> Vec<(DmaAddr, usize)> {
        self.inner.pushes.lock().unwrap().clone()
    }
}

impl SlcdDma for FakeDma {
    fn configure(&self, config: &SlaveConfig) -> Result<(), DmaError> {
        if self.inner.reject_config.load(Ordering::SeqCst) {
            return Err(DmaError::Config);
        }
        *self.inner.config.lock().unwrap() = Some(*config);
        Ok(())
    }

    fn push_single(&self, src: DmaAddr, len: usize) -> Result<(), DmaError> {
        if self.inner.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DmaError::Prepare);
        }
        self.inner.pushes.lock().unwrap().push((src, len));
        self.trace.record(Op::Push(src, len));
        Ok(())
    }
}

// =============================================================================
// Bridge and buffers
// =============================================================================

#[derive(Clone)]
pub struct FakeBridge {
    name: &'static str,
    modes: Arc<Mutex<Vec<DisplayMode>>>,
    trace: Trace,
}

impl FakeBridge {
    pub fn new(name: &'static str, trace: Trace) -> Self {
        Self { name, modes: Arc::new(Mutex::new(Vec::new())), trace }
    }

    /// Modes passed to `mode_set`, in order
    pub fn modes(&self) -> Vec<DisplayMode> {
        self.modes.lock().unwrap().clone()
    }

    fn call(&self, what: &'static str) {
        self.trace.record(Op::Bridge(self.name, what));
    }
}

impl Bridge for FakeBridge {
    fn pre_enable(&self) {
        self.call("pre_enable");
    }

    fn enable(&self) {
        self.call("enable");
    }

    fn disable(&self) {
        self.call("disable");
    }

    fn post_disable(&self) {
        self.call("post_disable");
    }

    fn mode_set(&self, mode: &DisplayMode, _adjusted: &DisplayMode) {
        self.modes.lock().unwrap().push(*mode);
        self.call("mode_set");
    }
}

/// A framebuffer at a fixed bus address
pub struct StaticBuffer {
    pub addr: DmaAddr,
    pub len: usize,
    pub format: PixelFormat,
}

impl StaticBuffer {
    pub fn for_mode(addr: DmaAddr, mode: &DisplayMode, format: PixelFormat) -> Self {
        let len = mode.hdisplay as usize * mode.vdisplay as usize * format.cpp();
        Self { addr, len, format }
    }
}

impl ScanoutBuffer for StaticBuffer {
    fn dma_addr(&self) -> DmaAddr {
        self.addr
    }

    fn byte_len(&self) -> usize {
        self.len
    }

    fn format(&self) -> PixelFormat {
        self.format
    }
}

#[repr(C, align(16))]
struct DescriptorMemory([u32; 4]);

/// Leaked host memory standing in for a coherent descriptor allocation
pub fn coherent_region() -> CoherentRegion {
    let mem = Box::leak(Box::new(DescriptorMemory([0xffff_ffff; 4])));
    let cpu = NonNull::from(mem).cast::<u8>();
    let bus = kseg_to_phys(cpu.as_ptr() as usize);
    unsafe { CoherentRegion::new(cpu, bus, core::mem::size_of::<DescriptorMemory>()) }
}

// =============================================================================
// Modes
// =============================================================================

/// 640x480@60, 25.175 MHz
pub fn vga() -> DisplayMode {
    DisplayMode {
        clock_khz: 25_175,
        hdisplay: 640,
        hsync_start: 656,
        hsync_end: 752,
        htotal: 800,
        vdisplay: 480,
        vsync_start: 490,
        vsync_end: 492,
        vtotal: 525,
        flags: ModeFlags::NHSYNC | ModeFlags::NVSYNC,
    }
}

/// 320x240@60 command-mode panel
pub fn qvga() -> DisplayMode {
    DisplayMode {
        clock_khz: 5_100,
        hdisplay: 320,
        hsync_start: 330,
        hsync_end: 331,
        htotal: 340,
        vdisplay: 240,
        vsync_start: 245,
        vsync_end: 246,
        vtotal: 250,
        flags: ModeFlags::empty(),
    }
}
