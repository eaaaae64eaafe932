//! Core traits and types shared by the sensor core and its collaborators.

use std::fmt;

use crate::controls::ControlId;

/// Pixel format representation (e.g., BG10, RG10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create a new `FourCC` from a 4-byte array.
    #[must_use]
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }

    /// 10-bit Bayer, BGGR order.
    pub const SBGGR10: Self = Self::new(b"BG10");
    /// 10-bit Bayer, GRBG order.
    pub const SGRBG10: Self = Self::new(b"BA10");
    /// 10-bit Bayer, GBRG order.
    pub const SGBRG10: Self = Self::new(b"GB10");
    /// 10-bit Bayer, RGGB order.
    pub const SRGGB10: Self = Self::new(b"RG10");
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

impl From<v4l::FourCC> for FourCC {
    fn from(fourcc: v4l::FourCC) -> Self {
        Self(fourcc.repr)
    }
}

impl From<FourCC> for v4l::FourCC {
    fn from(fourcc: FourCC) -> Self {
        Self::new(&fourcc.0)
    }
}

/// Video format announced on the sensor's source pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Format {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Pixel format.
    pub fourcc: FourCC,
    /// Bytes per line (stride).
    pub stride: u32,
    /// Total frame size in bytes.
    pub size: u32,
}

impl Format {
    /// Create a format with a packed RAW10 stride.
    #[must_use]
    pub const fn new(width: u32, height: u32, fourcc: FourCC) -> Self {
        let stride = width.saturating_mul(2); // 10-bit samples in 16-bit containers
        let size = stride.saturating_mul(height);
        Self {
            width,
            height,
            fourcc,
            stride,
            size,
        }
    }
}

/// A rectangle on the pixel array, in sensor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge.
    pub left: u32,
    /// Top edge.
    pub top: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Inclusive right edge coordinate.
    #[must_use]
    pub const fn right(&self) -> u32 {
        self.left + self.width - 1
    }

    /// Inclusive bottom edge coordinate.
    #[must_use]
    pub const fn bottom(&self) -> u32 {
        self.top + self.height - 1
    }
}

/// Width of a sensor register in bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegWidth {
    /// 8-bit register.
    Bits8,
    /// 16-bit register, big endian across two addresses.
    Bits16,
    /// 24-bit register, big endian across three addresses.
    Bits24,
}

impl RegWidth {
    /// Mask of the bits a register of this width can hold.
    #[must_use]
    pub const fn mask(self) -> u32 {
        match self {
            Self::Bits8 => 0xff,
            Self::Bits16 => 0xffff,
            Self::Bits24 => 0x00ff_ffff,
        }
    }
}

/// A sensor register: 16-bit address plus access width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    /// Register address.
    pub addr: u16,
    /// Access width.
    pub width: RegWidth,
}

impl Reg {
    /// 8-bit register at `addr`.
    #[must_use]
    pub const fn r8(addr: u16) -> Self {
        Self {
            addr,
            width: RegWidth::Bits8,
        }
    }

    /// 16-bit register at `addr`.
    #[must_use]
    pub const fn r16(addr: u16) -> Self {
        Self {
            addr,
            width: RegWidth::Bits16,
        }
    }

    /// 24-bit register at `addr`.
    #[must_use]
    pub const fn r24(addr: u16) -> Self {
        Self {
            addr,
            width: RegWidth::Bits24,
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.addr)
    }
}

/// A single step of a register program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegOp {
    /// Plain write of `value`.
    Write {
        /// Target register.
        reg: Reg,
        /// Value, truncated to the register width.
        value: u32,
    },
    /// Read-modify-write of the bits selected by `mask`.
    Update {
        /// Target register.
        reg: Reg,
        /// Bits to modify.
        mask: u32,
        /// New value of the masked bits.
        value: u32,
    },
}

impl RegOp {
    /// Plain register write.
    #[must_use]
    pub const fn write(reg: Reg, value: u32) -> Self {
        Self::Write { reg, value }
    }

    /// Masked read-modify-write.
    #[must_use]
    pub const fn update(reg: Reg, mask: u32, value: u32) -> Self {
        Self::Update { reg, mask, value }
    }

    /// Register this step touches.
    #[must_use]
    pub const fn reg(&self) -> Reg {
        match *self {
            Self::Write { reg, .. } | Self::Update { reg, .. } => reg,
        }
    }
}

/// Error type for sensor operations.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// A register transfer failed.
    #[error("register {reg} access failed: {reason}")]
    Bus {
        /// Register being accessed.
        reg: Reg,
        /// Transport-specific reason.
        reason: String,
    },
    /// The identification register held an unexpected value.
    #[error("chip id mismatch: expected {expected:#x}, found {found:#x}")]
    ChipIdMismatch {
        /// Expected chip id.
        expected: u32,
        /// Value read back.
        found: u32,
    },
    /// The board wires an unsupported number of CSI-2 data lanes.
    #[error("unsupported number of data lanes: {0}")]
    UnsupportedLaneCount(u32),
    /// The board description lists no link frequency.
    #[error("no link frequencies defined")]
    NoLinkFrequencies,
    /// The board description lists more link frequencies than supported.
    #[error("unsupported number of link frequencies: {0}")]
    TooManyLinkFrequencies(usize),
    /// A listed link frequency is not one the sensor can produce.
    #[error("unsupported link frequency {0}")]
    UnsupportedLinkFrequency(u64),
    /// The external clock does not run at the supported rate.
    #[error("unsupported xclk frequency {0}")]
    UnsupportedClockFrequency(u32),
    /// A required supply rail is missing from the board description.
    #[error("missing supply: {0}")]
    MissingSupply(String),
    /// The board description could not be parsed.
    #[error("malformed board description: {0}")]
    Config(#[from] serde_json::Error),
    /// I/O error while reading the board description.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Power sequencing failed.
    #[error("power control failed: {0}")]
    Power(String),
    /// The control is grabbed while streaming.
    #[error("control {0} is locked while streaming")]
    ControlLocked(ControlId),
    /// The control cannot be written.
    #[error("control {0} is read-only")]
    ReadOnly(ControlId),
    /// Value outside the control's current range.
    #[error("value {value} out of range [{min}, {max}] for control {id}")]
    OutOfRange {
        /// Control written.
        id: ControlId,
        /// Rejected value.
        value: i64,
        /// Current minimum.
        min: i64,
        /// Current maximum.
        max: i64,
    },
    /// The control is not part of this sensor's control set.
    #[error("unsupported control {0}")]
    UnknownControl(ControlId),
    /// A control without register mapping reached register application.
    #[error("unhandled control {0}")]
    UnhandledControl(ControlId),
    /// Enumeration index or request argument is invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The serialization lock was poisoned by a panicking holder.
    #[error("sensor lock poisoned")]
    LockPoisoned,
}

/// Result type for sensor operations.
pub type Result<T> = std::result::Result<T, SensorError>;

/// Register transport to the sensor (CCI over I2C on real hardware).
pub trait RegisterBus {
    /// Write `value` to `reg`, truncated to the register width.
    fn write(&mut self, reg: Reg, value: u32) -> Result<()>;

    /// Read the current value of `reg`.
    fn read(&mut self, reg: Reg) -> Result<u32>;

    /// Masked read-modify-write. Skips the write when nothing changes.
    fn update_bits(&mut self, reg: Reg, mask: u32, value: u32) -> Result<()> {
        let current = self.read(reg)?;
        let next = (current & !mask) | (value & mask);
        if next == current {
            return Ok(());
        }
        self.write(reg, next)
    }

    /// Issue a program in order, stopping at the first failure.
    fn write_batch(&mut self, ops: &[RegOp]) -> Result<()> {
        for op in ops {
            match *op {
                RegOp::Write { reg, value } => self.write(reg, value)?,
                RegOp::Update { reg, mask, value } => self.update_bits(reg, mask, value)?,
            }
        }
        Ok(())
    }
}

/// Power rails, external clock and reset line of the sensor.
pub trait PowerControl {
    /// Enable the clock and supplies, release reset, wait for stabilisation.
    fn power_on(&mut self) -> Result<()>;

    /// Assert reset, disable supplies and the clock.
    fn power_off(&mut self) -> Result<()>;
}
