//! JZ47xx LCD controller register map
//!
//! Offsets are relative to the controller's MMIO base. The descriptor shadow
//! registers (IID, SA*, FID*, CMD*) are loaded by the controller from the
//! DMA descriptor and are read-only.

// =============================================================================
// Register Offsets
// =============================================================================

pub const LCD_CFG: usize = 0x00;      // Panel Configuration
pub const LCD_VSYNC: usize = 0x04;    // Vertical Sync Pulse
pub const LCD_HSYNC: usize = 0x08;    // Horizontal Sync Pulse
pub const LCD_VAT: usize = 0x0C;      // Virtual Area (total size)
pub const LCD_DAH: usize = 0x10;      // Display Area Horizontal
pub const LCD_DAV: usize = 0x14;      // Display Area Vertical
pub const LCD_PS: usize = 0x18;       // Sharp PS signal
pub const LCD_CLS: usize = 0x1C;      // Sharp CLS signal
pub const LCD_SPL: usize = 0x20;      // Sharp SPL signal
pub const LCD_REV: usize = 0x24;      // Sharp REV signal
pub const LCD_CTRL: usize = 0x30;     // Control
pub const LCD_STATE: usize = 0x34;    // Status (write-to-clear IRQ bits)
pub const LCD_IID: usize = 0x38;      // Interrupt ID (RO)
pub const LCD_DA0: usize = 0x40;      // Descriptor Address, channel 0
pub const LCD_SA0: usize = 0x44;      // Source Address, channel 0 (RO)
pub const LCD_FID0: usize = 0x48;     // Frame ID, channel 0 (RO)
pub const LCD_CMD0: usize = 0x4C;     // DMA Command, channel 0 (RO)
pub const LCD_DA1: usize = 0x50;      // Descriptor Address, channel 1
pub const LCD_SA1: usize = 0x54;      // Source Address, channel 1 (RO)
pub const LCD_FID1: usize = 0x58;     // Frame ID, channel 1 (RO)
pub const LCD_CMD1: usize = 0x5C;     // DMA Command, channel 1 (RO)
pub const SLCD_MCFG: usize = 0xA0;    // Smart LCD Configuration
pub const SLCD_MCTRL: usize = 0xA4;   // Smart LCD Control
pub const SLCD_MSTATE: usize = 0xA8;  // Smart LCD Status
pub const SLCD_MDATA: usize = 0xAC;   // Smart LCD Data FIFO

pub const LCD_MAX_REGISTER: usize = SLCD_MDATA;

// Field positions in the timing registers
pub const VSYNC_VPS_OFFSET: u32 = 16;
pub const VSYNC_VPE_OFFSET: u32 = 0;
pub const HSYNC_HPS_OFFSET: u32 = 16;
pub const HSYNC_HPE_OFFSET: u32 = 0;
pub const VAT_HT_OFFSET: u32 = 16;
pub const VAT_VT_OFFSET: u32 = 0;
pub const DAH_HDS_OFFSET: u32 = 16;
pub const DAH_HDE_OFFSET: u32 = 0;
pub const DAV_VDS_OFFSET: u32 = 16;
pub const DAV_VDE_OFFSET: u32 = 0;

// =============================================================================
// Register Bits
// =============================================================================

bitflags::bitflags! {
    /// LCD_CFG bits. The low nibble plus bits 6/7 form the panel mode field.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LcdCfg: u32 {
        /// Smart (command-mode) panel; hardware strap, read-only
        const SLCD = 1 << 31;
        const PS_DISABLE = 1 << 23;
        const CLS_DISABLE = 1 << 22;
        const SPL_DISABLE = 1 << 21;
        const REV_DISABLE = 1 << 20;
        const HSYNCM = 1 << 19;
        const PCLKM = 1 << 18;
        const INV = 1 << 17;
        const SYNC_DIR = 1 << 16;
        const PS_POLARITY = 1 << 15;
        const CLS_POLARITY = 1 << 14;
        const SPL_POLARITY = 1 << 13;
        const REV_POLARITY = 1 << 12;
        const HSYNC_ACTIVE_LOW = 1 << 11;
        const PCLK_FALLING_EDGE = 1 << 10;
        const DE_ACTIVE_LOW = 1 << 9;
        const VSYNC_ACTIVE_LOW = 1 << 8;
        const MODE_GENERIC_18BIT = 1 << 7;
        const MODE_GENERIC_24BIT = 1 << 6;
        const MODE_SPECIAL_TFT_1 = 0x1;
        const MODE_TV_OUT_P = 0x6;
        const MODE_TV_OUT_I = 0x7;
        const MODE_8BIT_SERIAL = 0xC;
    }
}

impl LcdCfg {
    /// 16-bit generic TFT is the all-zero mode field
    pub const MODE_GENERIC_16BIT: LcdCfg = LcdCfg::empty();
}

bitflags::bitflags! {
    /// LCD_CTRL bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LcdCtrl: u32 {
        const BURST_16 = 0x2 << 28;
        const BURST_MASK = 0x3 << 28;
        const RGB555 = 1 << 27;
        /// Output FIFO underrun protection
        const OFUP = 1 << 26;
        const EOF_IRQ = 1 << 13;
        const SOF_IRQ = 1 << 12;
        const OFU_IRQ = 1 << 11;
        const DISABLE = 1 << 4;
        const ENABLE = 1 << 3;
        const BPP_15_16 = 0x4;
        const BPP_18_24 = 0x5;
        const BPP_MASK = 0x7;
    }
}

bitflags::bitflags! {
    /// LCD_STATE bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LcdState: u32 {
        const QUICK_DISABLED = 1 << 7;
        const EOF_IRQ = 1 << 5;
        const SOF_IRQ = 1 << 4;
        const OUT_FIFO_UNDERRUN = 1 << 3;
        const DISABLED = 1 << 0;
    }
}

bitflags::bitflags! {
    /// Descriptor command word bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct LcdCmd: u32 {
        const SOF_IRQ = 1 << 31;
        const EOF_IRQ = 1 << 30;
        const ENABLE_PAL = 1 << 28;
        const LENGTH_MASK = 0x00FF_FFFF;
    }
}

bitflags::bitflags! {
    /// SLCD_MCTRL bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SlcdCtrl: u32 {
        const DMATXEN = 1 << 0;
    }
}

bitflags::bitflags! {
    /// SLCD_MSTATE bits
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SlcdState: u32 {
        const BUSY = 1 << 0;
    }
}

/// Whether software may write the register at `offset`.
pub fn is_writeable(offset: usize) -> bool {
    if offset > LCD_MAX_REGISTER || offset % 4 != 0 {
        return false;
    }
    !matches!(
        offset,
        LCD_IID | LCD_SA0 | LCD_FID0 | LCD_CMD0 | LCD_SA1 | LCD_FID1 | LCD_CMD1
    )
}
