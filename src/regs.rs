//! OV64A40 register map and fixed sensor parameters.

// Register names follow the datasheet; they are their own documentation.
#![allow(missing_docs)]

use crate::traits::Reg;

/// External clock rate the PLL tables are computed for.
pub const XCLK_FREQ: u32 = 24_000_000;

/// Native pixel array size, including optical black and dummy pixels.
pub const NATIVE_WIDTH: u32 = 9286;
/// Native pixel array height.
pub const NATIVE_HEIGHT: u32 = 6976;

/// Active pixel array, left edge.
pub const PIXEL_ARRAY_LEFT: u32 = 0;
/// Active pixel array, top edge.
pub const PIXEL_ARRAY_TOP: u32 = 0;
/// Active pixel array width.
pub const PIXEL_ARRAY_WIDTH: u32 = 9248;
/// Active pixel array height.
pub const PIXEL_ARRAY_HEIGHT: u32 = 6944;

/// Output pixel rate, identical for both link frequencies.
pub const PIXEL_RATE: u64 = 300_000_000;

/// Link frequency produced by the default PLL configuration.
pub const LINK_FREQ_456M: u64 = 456_000_000;
/// Link frequency produced by the reduced PLL1 multiplier.
pub const LINK_FREQ_360M: u64 = 360_000_000;

/// Only supported CSI-2 lane count.
pub const NUM_DATA_LANES: u32 = 2;

/// Supply rails; they can be enabled in any order.
pub const SUPPLY_NAMES: [&str; 3] = [
    "avdd",  // Analog (2.8V) supply
    "dovdd", // Digital Core (1.8V) supply
    "dvdd",  // IF (1.1V) supply
];

/// Autosuspend delay applied to the runtime power reference.
pub const AUTOSUSPEND_DELAY_MS: u64 = 1000;

pub const PLL1_PRE_DIV0: Reg = Reg::r8(0x0301);
pub const PLL1_PRE_DIV: Reg = Reg::r8(0x0303);
pub const PLL1_MULTIPLIER: Reg = Reg::r16(0x0304);
pub const PLL1_M_DIV: Reg = Reg::r8(0x0307);
pub const PLL2_SEL_BAK_SA1: Reg = Reg::r8(0x0320);
pub const PLL2_PRE_DIV: Reg = Reg::r8(0x0323);
pub const PLL2_MULTIPLIER: Reg = Reg::r16(0x0324);
pub const PLL2_PRE_DIV0: Reg = Reg::r8(0x0326);
pub const PLL2_DIV_SYS_PRE: Reg = Reg::r8(0x0329);

/// Default PLL1 multiplier (456 MHz link).
pub const PLL1_MULTIPLIER_456M: u32 = 0x0098;
/// Reduced PLL1 multiplier (360 MHz link).
pub const PLL1_MULTIPLIER_360M: u32 = 0x0078;

/// Streaming control.
pub const SMIA: Reg = Reg::r8(0x0100);
pub const SMIA_STREAMING: u32 = 1 << 0;

pub const CHIP_ID: Reg = Reg::r24(0x300a);
pub const CHIP_ID_VALUE: u32 = 0x0056_6441;

pub const MEC_LONG_EXPO: Reg = Reg::r24(0x3500);
pub const EXPOSURE_MIN: i64 = 16;
/// Lines reserved between the exposure and the frame length.
pub const EXPOSURE_MARGIN: i64 = 32;

pub const MEC_LONG_GAIN: Reg = Reg::r16(0x3508);
pub const ANA_GAIN_MIN: i64 = 0x80;
pub const ANA_GAIN_MAX: i64 = 0x7ff;
pub const ANA_GAIN_DEFAULT: i64 = 0x80;

// Analogue crop, inclusive end coordinates.
pub const TIMING_CTRL0: Reg = Reg::r16(0x3800);
pub const TIMING_CTRL2: Reg = Reg::r16(0x3802);
pub const TIMING_CTRL4: Reg = Reg::r16(0x3804);
pub const TIMING_CTRL6: Reg = Reg::r16(0x3806);
// ISP output size.
pub const TIMING_CTRL8: Reg = Reg::r16(0x3808);
pub const TIMING_CTRLA: Reg = Reg::r16(0x380a);
// Total line length (HTS) and frame length (VTS).
pub const TIMING_CTRLC: Reg = Reg::r16(0x380c);
pub const TIMING_CTRLE: Reg = Reg::r16(0x380e);
// ISP windowing offsets.
pub const TIMING_CTRL10: Reg = Reg::r16(0x3810);
pub const TIMING_CTRL12: Reg = Reg::r16(0x3812);
// Skipping increments, odd << 4 | even.
pub const TIMING_CTRL14: Reg = Reg::r8(0x3814);
pub const TIMING_CTRL15: Reg = Reg::r8(0x3815);

pub const TIMING_CTRL_20: Reg = Reg::r8(0x3820);
pub const TIMING_CTRL_20_VFLIP: u32 = 1 << 2;
pub const TIMING_CTRL_20_VBIN: u32 = 1 << 1;

pub const TIMING_CTRL_21: Reg = Reg::r8(0x3821);
pub const TIMING_CTRL_21_HFLIP: u32 = 1 << 2;
pub const TIMING_CTRL_21_HBIN_CONF: u32 = 1 << 0;

// VTS is split over three byte registers when written from the vblank control.
pub const TIMINGS_VTS_HIGH: Reg = Reg::r8(0x3840);
pub const TIMINGS_VTS_MID: Reg = Reg::r8(0x380e);
pub const TIMINGS_VTS_LOW: Reg = Reg::r8(0x380f);
pub const VTS_MAX: i64 = 0x00ff_ffff;
/// Smallest vertical blank the sensor accepts, in lines.
pub const VBLANK_MIN: i64 = 32;

pub const TEST_PATTERN: Reg = Reg::r8(0x5081);
pub const TEST_PATTERN_DISABLED: u32 = 0x00;
pub const TEST_PATTERN_TYPE1: u32 = 1 << 0;
pub const TEST_PATTERN_TYPE2: u32 = (1 << 2) | (1 << 0);
pub const TEST_PATTERN_TYPE3: u32 = (1 << 4) | (1 << 0);
pub const TEST_PATTERN_TYPE4: u32 = (1 << 5) | (1 << 0);

/// Encode a skipping increment pair for `TIMING_CTRL14`/`TIMING_CTRL15`.
#[must_use]
pub const fn skipping_config(odd: u32, even: u32) -> u32 {
    (odd << 4) | even
}
