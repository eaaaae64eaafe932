//! Opaque register tables.
//!
//! Placeholder programs standing in for the sensor vendor's init, PLL and
//! per-mode tables, which are not published with this crate. The values are
//! not tuned for real silicon; replace them with the vendor tables before
//! driving hardware. They are issued verbatim, and geometry, timings and
//! subsampling are programmed separately from the mode catalog after a mode
//! table is written.

use crate::regs::{
    PLL1_MULTIPLIER, PLL1_MULTIPLIER_456M, PLL1_M_DIV, PLL1_PRE_DIV, PLL1_PRE_DIV0,
    PLL2_DIV_SYS_PRE, PLL2_MULTIPLIER, PLL2_PRE_DIV, PLL2_PRE_DIV0, PLL2_SEL_BAK_SA1,
};
use crate::traits::{Reg, RegOp};

const fn w(addr: u16, value: u32) -> RegOp {
    RegOp::write(Reg::r8(addr), value)
}

/// PLL configuration for a 456 MHz link from a 24 MHz input (placeholder values
/// apart from the PLL1 multiplier).
pub static PLL_CONFIG: [RegOp; 9] = [
    RegOp::write(PLL1_PRE_DIV0, 0x00),
    RegOp::write(PLL1_PRE_DIV, 0x01),
    RegOp::write(PLL1_MULTIPLIER, PLL1_MULTIPLIER_456M),
    RegOp::write(PLL1_M_DIV, 0x00),
    RegOp::write(PLL2_SEL_BAK_SA1, 0x00),
    RegOp::write(PLL2_PRE_DIV, 0x04),
    RegOp::write(PLL2_MULTIPLIER, 0x0050),
    RegOp::write(PLL2_PRE_DIV0, 0x01),
    RegOp::write(PLL2_DIV_SYS_PRE, 0x01),
];

/// Sensor-wide defaults, written once after every power-up (placeholder).
pub static INIT: [RegOp; 40] = [
    w(0x0103, 0x01),
    w(0x0102, 0x01),
    w(0x0301, 0x00),
    w(0x0304, 0x00),
    w(0x0305, 0x98),
    w(0x0306, 0x04),
    w(0x0307, 0x00),
    w(0x0323, 0x04),
    w(0x0324, 0x00),
    w(0x0325, 0x50),
    w(0x0326, 0x01),
    w(0x0329, 0x01),
    w(0x3002, 0x21),
    w(0x3009, 0x06),
    w(0x3012, 0x21),
    w(0x301e, 0x98),
    w(0x3026, 0x10),
    w(0x3027, 0x08),
    w(0x3106, 0x80),
    w(0x3400, 0x04),
    w(0x3419, 0x13),
    w(0x3439, 0x00),
    w(0x343a, 0x10),
    w(0x3503, 0x88),
    w(0x3506, 0x0a),
    w(0x3508, 0x01),
    w(0x3509, 0x00),
    w(0x3600, 0x00),
    w(0x3620, 0x24),
    w(0x3700, 0x2a),
    w(0x3830, 0x00),
    w(0x3836, 0x00),
    w(0x3837, 0x02),
    w(0x3901, 0x08),
    w(0x4000, 0xf3),
    w(0x4009, 0x0d),
    w(0x4800, 0x60),
    w(0x4837, 0x0b),
    w(0x5000, 0x81),
    w(0x5081, 0x00),
];

/// 9248x6944, full array.
pub static MODE_9248X6944: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x1b),
    w(0x3502, 0x20),
    w(0x3680, 0x00),
    w(0x3816, 0x00),
    w(0x3817, 0x00),
    w(0x4006, 0x08),
    w(0x4500, 0x01),
    w(0x4501, 0x00),
    w(0x5002, 0x01),
];

/// 8000x6000, analogue crop plus digital crop.
pub static MODE_8000X6000: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x18),
    w(0x3502, 0xe0),
    w(0x3680, 0x00),
    w(0x3816, 0x00),
    w(0x3817, 0x00),
    w(0x4006, 0x08),
    w(0x4500, 0x01),
    w(0x4501, 0x00),
    w(0x5002, 0x01),
];

/// 4624x3472, 2x2 binned.
pub static MODE_4624X3472: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x0d),
    w(0x3502, 0xa0),
    w(0x3680, 0x84),
    w(0x3816, 0x01),
    w(0x3817, 0x01),
    w(0x4006, 0x04),
    w(0x4500, 0x07),
    w(0x4501, 0x04),
    w(0x5002, 0x00),
];

/// 3840x2160, analogue crop plus 2x2 binning plus digital crop.
pub static MODE_3840X2160: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x08),
    w(0x3502, 0x6a),
    w(0x3680, 0x84),
    w(0x3816, 0x01),
    w(0x3817, 0x01),
    w(0x4006, 0x04),
    w(0x4500, 0x07),
    w(0x4501, 0x04),
    w(0x5002, 0x00),
];

/// 2312x1736, 4x4 binned.
pub static MODE_2312X1736: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x07),
    w(0x3502, 0xae),
    w(0x3680, 0x88),
    w(0x3816, 0x03),
    w(0x3817, 0x03),
    w(0x4006, 0x02),
    w(0x4500, 0x0f),
    w(0x4501, 0x0c),
    w(0x5002, 0x00),
];

/// 1920x1080, analogue crop plus 4x4 binning plus digital crop.
pub static MODE_1920X1080: [RegOp; 12] = [
    w(0x3016, 0xf0),
    w(0x3017, 0xf0),
    w(0x3018, 0x32),
    w(0x3501, 0x05),
    w(0x3502, 0x35),
    w(0x3680, 0x88),
    w(0x3816, 0x03),
    w(0x3817, 0x03),
    w(0x4006, 0x02),
    w(0x4500, 0x0f),
    w(0x4501, 0x0c),
    w(0x5002, 0x00),
];
