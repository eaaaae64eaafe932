//! Capture mode catalog and timing resolution.
//!
//! Modes are listed from the highest to the lowest resolution. Each mode
//! carries the default line/frame length for both supported link frequencies;
//! every downstream timing computation goes through [`Mode::timings`].

use crate::regs::{LINK_FREQ_360M, LINK_FREQ_456M};
use crate::tables;
use crate::traits::{RegOp, Rect};

/// CSI-2 link frequencies the PLL tables can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkFrequency {
    /// 456 MHz, the default PLL configuration.
    Mhz456,
    /// 360 MHz, reduced PLL1 multiplier.
    Mhz360,
}

impl LinkFrequency {
    /// Frequency in Hz.
    #[must_use]
    pub const fn hz(self) -> u64 {
        match self {
            Self::Mhz456 => LINK_FREQ_456M,
            Self::Mhz360 => LINK_FREQ_360M,
        }
    }

    /// Map a frequency in Hz back to a supported link frequency.
    #[must_use]
    pub const fn from_hz(hz: u64) -> Option<Self> {
        match hz {
            LINK_FREQ_456M => Some(Self::Mhz456),
            LINK_FREQ_360M => Some(Self::Mhz360),
            _ => None,
        }
    }
}

/// Line and frame length used for all timing math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Pixel clocks per line, before the sensor's internal x4 multiplier.
    pub line_length: u32,
    /// Lines per frame.
    pub frame_length: u32,
}

impl Timings {
    const fn new(frame_length: u32, line_length: u32) -> Self {
        Self {
            line_length,
            frame_length,
        }
    }
}

/// Pixel skipping and binning configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subsampling {
    /// Horizontal odd increment.
    pub x_odd_inc: u32,
    /// Horizontal even increment.
    pub x_even_inc: u32,
    /// Vertical odd increment.
    pub y_odd_inc: u32,
    /// Vertical even increment.
    pub y_even_inc: u32,
    /// Vertical binning enable.
    pub vertical_bin: bool,
    /// Horizontal binning enable.
    pub horizontal_bin: bool,
}

const NO_SUBSAMPLING: Subsampling = Subsampling {
    x_odd_inc: 1,
    x_even_inc: 1,
    y_odd_inc: 1,
    y_even_inc: 1,
    vertical_bin: false,
    horizontal_bin: false,
};

const BIN_2X2: Subsampling = Subsampling {
    x_odd_inc: 3,
    x_even_inc: 1,
    y_odd_inc: 1,
    y_even_inc: 1,
    vertical_bin: true,
    horizontal_bin: false,
};

const BIN_4X4: Subsampling = Subsampling {
    x_odd_inc: 3,
    x_even_inc: 1,
    y_odd_inc: 3,
    y_even_inc: 1,
    vertical_bin: true,
    horizontal_bin: true,
};

/// A supported capture mode.
#[derive(Debug, PartialEq, Eq)]
pub struct Mode {
    /// Output width.
    pub width: u32,
    /// Output height.
    pub height: u32,
    /// Default timings, indexed 456 MHz then 360 MHz.
    timings: [Timings; 2],
    /// Window read from the pixel array.
    pub analogue_crop: Rect,
    /// Output window after subsampling; its size equals the mode size.
    pub digital_crop: Rect,
    /// Skipping and binning.
    pub subsampling: Subsampling,
    /// Opaque register table for this mode.
    pub reglist: &'static [RegOp],
}

impl Mode {
    /// Authoritative line/frame length of this mode at `freq`.
    #[must_use]
    pub const fn timings(&self, freq: LinkFrequency) -> Timings {
        let [fast, slow] = self.timings;
        match freq {
            LinkFrequency::Mhz456 => fast,
            LinkFrequency::Mhz360 => slow,
        }
    }
}

static MODES: [Mode; 6] = [
    // Full resolution
    Mode {
        width: 9248,
        height: 6944,
        // 2.6 fps, 2 fps
        timings: [Timings::new(7072, 4072), Timings::new(7072, 5248)],
        analogue_crop: Rect::new(0, 0, 9280, 6976),
        digital_crop: Rect::new(17, 16, 9248, 6944),
        subsampling: NO_SUBSAMPLING,
        reglist: &tables::MODE_9248X6944,
    },
    // Analogue crop + digital crop
    Mode {
        width: 8000,
        height: 6000,
        // 3 fps, 2.5 fps
        timings: [Timings::new(6400, 3848), Timings::new(6304, 4736)],
        analogue_crop: Rect::new(624, 472, 8048, 6032),
        digital_crop: Rect::new(17, 16, 8000, 6000),
        subsampling: NO_SUBSAMPLING,
        reglist: &tables::MODE_8000X6000,
    },
    // 2x2 downscaled
    Mode {
        width: 4624,
        height: 3472,
        // 10 fps, 7 fps
        timings: [Timings::new(3533, 2112), Timings::new(3939, 2720)],
        analogue_crop: Rect::new(0, 0, 9280, 6976),
        digital_crop: Rect::new(9, 8, 4624, 3472),
        subsampling: BIN_2X2,
        reglist: &tables::MODE_4624X3472,
    },
    // Analogue crop + 2x2 downscale + digital crop
    Mode {
        width: 3840,
        height: 2160,
        // 20 fps, 15 fps
        timings: [Timings::new(2218, 1690), Timings::new(2270, 2202)],
        analogue_crop: Rect::new(784, 1312, 7712, 4352),
        digital_crop: Rect::new(9, 8, 3840, 2160),
        subsampling: BIN_2X2,
        reglist: &tables::MODE_3840X2160,
    },
    // 4x4 downscaled
    Mode {
        width: 2312,
        height: 1736,
        // 30 fps, 25 fps
        timings: [Timings::new(1998, 1248), Timings::new(1994, 1504)],
        analogue_crop: Rect::new(0, 0, 9280, 6976),
        digital_crop: Rect::new(5, 4, 2312, 1736),
        subsampling: BIN_4X4,
        reglist: &tables::MODE_2312X1736,
    },
    // Analogue crop + 4x4 downscale + digital crop
    Mode {
        width: 1920,
        height: 1080,
        // 60 fps, 45 fps
        timings: [Timings::new(1397, 880), Timings::new(1216, 1360)],
        analogue_crop: Rect::new(784, 1312, 7712, 4352),
        digital_crop: Rect::new(7, 6, 1920, 1080),
        subsampling: BIN_4X4,
        reglist: &tables::MODE_1920X1080,
    },
];

/// All supported modes, highest resolution first.
#[must_use]
pub fn modes() -> &'static [Mode] {
    &MODES
}

/// The highest resolution mode, selected at initialization.
#[must_use]
pub fn default_mode() -> &'static Mode {
    let [first, ..] = &MODES;
    first
}

/// Mode closest to `width`x`height` by summed absolute dimension difference.
///
/// Ties go to the entry listed first, i.e. the higher resolution one.
#[must_use]
pub fn nearest(width: u32, height: u32) -> &'static Mode {
    let mut best = default_mode();
    let mut best_error = u64::MAX;

    for mode in modes() {
        let error =
            u64::from(mode.width.abs_diff(width)) + u64::from(mode.height.abs_diff(height));
        if error < best_error {
            best = mode;
            best_error = error;
        }
        if error == 0 {
            break;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regs::VBLANK_MIN;

    const FREQS: [LinkFrequency; 2] = [LinkFrequency::Mhz456, LinkFrequency::Mhz360];

    #[test]
    fn test_catalog_ordered_by_resolution() {
        let areas: Vec<u32> = modes().iter().map(|m| m.width * m.height).collect();
        assert_eq!(areas.len(), 6);
        assert!(areas.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn test_digital_crop_matches_mode_size() {
        for mode in modes() {
            assert_eq!(mode.digital_crop.width, mode.width);
            assert_eq!(mode.digital_crop.height, mode.height);
        }
    }

    #[test]
    fn test_frame_length_leaves_minimum_blank() {
        for mode in modes() {
            for freq in FREQS {
                let timings = mode.timings(freq);
                assert!(
                    i64::from(timings.frame_length) >= i64::from(mode.height) + VBLANK_MIN,
                    "{}x{} at {freq:?}",
                    mode.width,
                    mode.height
                );
            }
        }
    }

    #[test]
    fn test_timings_select_by_frequency() {
        let mode = nearest(1920, 1080);
        assert_eq!(
            mode.timings(LinkFrequency::Mhz456),
            Timings {
                line_length: 880,
                frame_length: 1397
            }
        );
        assert_eq!(
            mode.timings(LinkFrequency::Mhz360),
            Timings {
                line_length: 1360,
                frame_length: 1216
            }
        );
    }

    #[test]
    fn test_nearest_exact_match() {
        for mode in modes() {
            assert!(std::ptr::eq(nearest(mode.width, mode.height), mode));
        }
    }

    #[test]
    fn test_nearest_1920x1200_picks_1080p() {
        let mode = nearest(1920, 1200);
        assert_eq!((mode.width, mode.height), (1920, 1080));
    }

    #[test]
    fn test_nearest_tie_prefers_higher_resolution() {
        // Exact midpoint between the two 4x4 modes.
        let width = (2312 + 1920) / 2;
        let height = (1736 + 1080) / 2;
        let mode = nearest(width, height);
        assert_eq!((mode.width, mode.height), (2312, 1736));
    }

    #[test]
    fn test_nearest_out_of_bounds_requests() {
        assert_eq!(nearest(0, 0).width, 1920);
        assert_eq!(nearest(u32::MAX / 4, u32::MAX / 4).width, 9248);
    }

    #[test]
    fn test_nearest_extreme_requests() {
        assert_eq!(nearest(u32::MAX, u32::MAX).width, 9248);
        assert_eq!(nearest(u32::MAX, 0).width, 9248);
        // Smallest width minus height among the modes.
        assert_eq!(nearest(0, u32::MAX).width, 2312);
    }

    #[test]
    fn test_link_frequency_hz_round_trip() {
        assert_eq!(LinkFrequency::from_hz(456_000_000), Some(LinkFrequency::Mhz456));
        assert_eq!(LinkFrequency::from_hz(360_000_000), Some(LinkFrequency::Mhz360));
        assert_eq!(LinkFrequency::from_hz(400_000_000), None);
    }
}
