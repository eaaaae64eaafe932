//! Register program builders.
//!
//! Builders compute register programs without touching the bus; the streaming
//! state machine issues them through [`RegisterBus::write_batch`].
//!
//! [`RegisterBus::write_batch`]: crate::traits::RegisterBus::write_batch

use crate::controls::ControlId;
use crate::modes::{LinkFrequency, Mode, Timings};
use crate::regs::{
    skipping_config, MEC_LONG_EXPO, MEC_LONG_GAIN, PLL1_MULTIPLIER, PLL1_MULTIPLIER_360M,
    TEST_PATTERN, TEST_PATTERN_DISABLED, TEST_PATTERN_TYPE1, TEST_PATTERN_TYPE2,
    TEST_PATTERN_TYPE3, TEST_PATTERN_TYPE4, TIMINGS_VTS_HIGH, TIMINGS_VTS_LOW, TIMINGS_VTS_MID,
    TIMING_CTRL0, TIMING_CTRL10, TIMING_CTRL12, TIMING_CTRL14, TIMING_CTRL15, TIMING_CTRL2,
    TIMING_CTRL4, TIMING_CTRL6, TIMING_CTRL8, TIMING_CTRLA, TIMING_CTRLC, TIMING_CTRLE,
    TIMING_CTRL_20, TIMING_CTRL_20_VBIN, TIMING_CTRL_20_VFLIP, TIMING_CTRL_21,
    TIMING_CTRL_21_HBIN_CONF, TIMING_CTRL_21_HFLIP,
};
use crate::tables;
use crate::traits::{RegOp, Result, SensorError};

/// Register values selected by the test pattern menu, in menu order.
pub const TEST_PATTERN_VALUES: [u32; 5] = [
    TEST_PATTERN_DISABLED,
    TEST_PATTERN_TYPE1,
    TEST_PATTERN_TYPE2,
    TEST_PATTERN_TYPE3,
    TEST_PATTERN_TYPE4,
];

/// Sensor-wide defaults, issued once per power-up before any mode table.
#[must_use]
pub fn init_sequence() -> &'static [RegOp] {
    &tables::INIT
}

/// The opaque register table of `mode`.
#[must_use]
pub const fn mode_sequence(mode: &Mode) -> &'static [RegOp] {
    mode.reglist
}

/// Crop windows, total timings, skipping and binning for `mode`.
#[must_use]
pub fn geometry_sequence(mode: &Mode, timings: Timings) -> Vec<RegOp> {
    let anacrop = &mode.analogue_crop;
    let digicrop = &mode.digital_crop;
    let sub = &mode.subsampling;

    vec![
        // Analogue crop.
        RegOp::write(TIMING_CTRL0, anacrop.left),
        RegOp::write(TIMING_CTRL2, anacrop.top),
        RegOp::write(TIMING_CTRL4, anacrop.right()),
        RegOp::write(TIMING_CTRL6, anacrop.bottom()),
        // ISP windowing.
        RegOp::write(TIMING_CTRL10, digicrop.left),
        RegOp::write(TIMING_CTRL12, digicrop.top),
        RegOp::write(TIMING_CTRL8, digicrop.width),
        RegOp::write(TIMING_CTRLA, digicrop.height),
        // Total timings.
        RegOp::write(TIMING_CTRLC, timings.line_length),
        RegOp::write(TIMING_CTRLE, timings.frame_length),
        // Skipping.
        RegOp::write(TIMING_CTRL14, skipping_config(sub.x_odd_inc, sub.x_even_inc)),
        RegOp::write(TIMING_CTRL15, skipping_config(sub.y_odd_inc, sub.y_even_inc)),
        // Binning.
        RegOp::update(
            TIMING_CTRL_20,
            TIMING_CTRL_20_VBIN,
            if sub.vertical_bin { TIMING_CTRL_20_VBIN } else { 0 },
        ),
        RegOp::update(
            TIMING_CTRL_21,
            TIMING_CTRL_21_HBIN_CONF,
            if sub.horizontal_bin { TIMING_CTRL_21_HBIN_CONF } else { 0 },
        ),
    ]
}

/// PLL programming for `freq`.
///
/// The default configuration yields 456 MHz; 360 MHz overrides the PLL1
/// multiplier afterwards.
#[must_use]
pub fn link_frequency_sequence(freq: LinkFrequency) -> Vec<RegOp> {
    let mut ops = tables::PLL_CONFIG.to_vec();
    if freq == LinkFrequency::Mhz360 {
        ops.push(RegOp::write(PLL1_MULTIPLIER, PLL1_MULTIPLIER_360M));
    }
    ops
}

/// Register program that applies `value` to control `id`.
///
/// `link_frequencies` is the board's ordered list the link frequency control
/// indexes into. Controls with no register mapping are an invariant violation.
pub fn control_sequence(
    id: ControlId,
    value: i64,
    mode: &Mode,
    link_frequencies: &[LinkFrequency],
) -> Result<Vec<RegOp>> {
    let ops = match id {
        ControlId::Exposure => vec![RegOp::write(MEC_LONG_EXPO, reg_value(id, value)?)],
        ControlId::AnalogueGain => vec![RegOp::write(MEC_LONG_GAIN, reg_value(id, value)? << 1)],
        ControlId::VerticalBlank => {
            let vts = reg_value(id, value)? + mode.height;
            vec![
                RegOp::write(TIMINGS_VTS_LOW, vts & 0xff),
                RegOp::write(TIMINGS_VTS_MID, (vts >> 8) & 0xff),
                RegOp::write(TIMINGS_VTS_HIGH, (vts >> 16) & 0xff),
            ]
        }
        ControlId::VerticalFlip => vec![RegOp::update(
            TIMING_CTRL_20,
            TIMING_CTRL_20_VFLIP,
            reg_value(id, value)? << 2,
        )],
        // The mirror bit is active low.
        ControlId::HorizontalFlip => vec![RegOp::update(
            TIMING_CTRL_21,
            TIMING_CTRL_21_HFLIP,
            if value != 0 { 0 } else { TIMING_CTRL_21_HFLIP },
        )],
        ControlId::TestPattern => {
            let pattern = usize::try_from(value)
                .ok()
                .and_then(|index| TEST_PATTERN_VALUES.get(index))
                .ok_or_else(|| invalid_value(id, value))?;
            vec![RegOp::write(TEST_PATTERN, *pattern)]
        }
        ControlId::LinkFrequency => {
            let freq = usize::try_from(value)
                .ok()
                .and_then(|index| link_frequencies.get(index))
                .ok_or_else(|| invalid_value(id, value))?;
            link_frequency_sequence(*freq)
        }
        ControlId::PixelRate
        | ControlId::HorizontalBlank
        | ControlId::CameraOrientation
        | ControlId::CameraSensorRotation => {
            log::error!("Unhandled control: {id}");
            return Err(SensorError::UnhandledControl(id));
        }
    };

    Ok(ops)
}

fn reg_value(id: ControlId, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| invalid_value(id, value))
}

fn invalid_value(id: ControlId, value: i64) -> SensorError {
    SensorError::InvalidArgument(format!("value {value} cannot be programmed for {id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::{modes, nearest};
    use crate::traits::Reg;

    fn written(ops: &[RegOp], reg: Reg) -> Option<u32> {
        ops.iter().find_map(|op| match *op {
            RegOp::Write { reg: r, value } if r == reg => Some(value),
            _ => None,
        })
    }

    #[test]
    fn test_geometry_uses_inclusive_end_coordinates() {
        let mode = nearest(3840, 2160);
        let ops = geometry_sequence(mode, mode.timings(LinkFrequency::Mhz456));

        assert_eq!(written(&ops, TIMING_CTRL0), Some(784));
        assert_eq!(written(&ops, TIMING_CTRL2), Some(1312));
        assert_eq!(written(&ops, TIMING_CTRL4), Some(784 + 7712 - 1));
        assert_eq!(written(&ops, TIMING_CTRL6), Some(1312 + 4352 - 1));
    }

    #[test]
    fn test_geometry_programs_digital_crop_and_timings() {
        let mode = nearest(1920, 1080);
        let ops = geometry_sequence(mode, mode.timings(LinkFrequency::Mhz360));

        assert_eq!(written(&ops, TIMING_CTRL10), Some(7));
        assert_eq!(written(&ops, TIMING_CTRL12), Some(6));
        assert_eq!(written(&ops, TIMING_CTRL8), Some(1920));
        assert_eq!(written(&ops, TIMING_CTRLA), Some(1080));
        assert_eq!(written(&ops, TIMING_CTRLC), Some(1360));
        assert_eq!(written(&ops, TIMING_CTRLE), Some(1216));
    }

    #[test]
    fn test_geometry_order_ends_with_subsampling() {
        let mode = nearest(2312, 1736);
        let ops = geometry_sequence(mode, mode.timings(LinkFrequency::Mhz456));
        let regs: Vec<Reg> = ops.iter().map(RegOp::reg).collect();

        assert_eq!(regs.len(), 14);
        assert_eq!(regs.get(10), Some(&TIMING_CTRL14));
        assert_eq!(regs.get(11), Some(&TIMING_CTRL15));
        assert_eq!(written(&ops, TIMING_CTRL14), Some(0x31));
        assert_eq!(written(&ops, TIMING_CTRL15), Some(0x31));
        assert_eq!(
            ops.get(12),
            Some(&RegOp::update(TIMING_CTRL_20, TIMING_CTRL_20_VBIN, TIMING_CTRL_20_VBIN))
        );
        assert_eq!(
            ops.get(13),
            Some(&RegOp::update(
                TIMING_CTRL_21,
                TIMING_CTRL_21_HBIN_CONF,
                TIMING_CTRL_21_HBIN_CONF
            ))
        );
    }

    #[test]
    fn test_full_resolution_disables_binning() {
        let mode = modes().first().expect("catalog is not empty");
        let ops = geometry_sequence(mode, mode.timings(LinkFrequency::Mhz456));

        assert_eq!(written(&ops, TIMING_CTRL14), Some(0x11));
        assert!(ops.contains(&RegOp::update(TIMING_CTRL_20, TIMING_CTRL_20_VBIN, 0)));
        assert!(ops.contains(&RegOp::update(TIMING_CTRL_21, TIMING_CTRL_21_HBIN_CONF, 0)));
    }

    #[test]
    fn test_link_frequency_360_overrides_multiplier_last() {
        let ops = link_frequency_sequence(LinkFrequency::Mhz360);
        assert_eq!(ops.len(), tables::PLL_CONFIG.len() + 1);
        assert_eq!(
            ops.last(),
            Some(&RegOp::write(PLL1_MULTIPLIER, PLL1_MULTIPLIER_360M))
        );
    }

    #[test]
    fn test_link_frequency_456_is_default_table() {
        let ops = link_frequency_sequence(LinkFrequency::Mhz456);
        assert_eq!(ops, tables::PLL_CONFIG.to_vec());
    }

    #[test]
    fn test_vblank_splits_vts_over_three_registers() {
        let mode = nearest(1920, 1080);
        let ops = control_sequence(ControlId::VerticalBlank, 0x1_0000, mode, &[])
            .expect("vblank is programmable");
        let vts = 0x1_0000 + 1080;

        assert_eq!(
            ops,
            vec![
                RegOp::write(TIMINGS_VTS_LOW, vts & 0xff),
                RegOp::write(TIMINGS_VTS_MID, (vts >> 8) & 0xff),
                RegOp::write(TIMINGS_VTS_HIGH, (vts >> 16) & 0xff),
            ]
        );
    }

    #[test]
    fn test_gain_is_shifted() {
        let mode = nearest(1920, 1080);
        let ops = control_sequence(ControlId::AnalogueGain, 0x80, mode, &[])
            .expect("gain is programmable");
        assert_eq!(ops, vec![RegOp::write(MEC_LONG_GAIN, 0x100)]);
    }

    #[test]
    fn test_hflip_polarity_is_inverted() {
        let mode = nearest(1920, 1080);
        let on = control_sequence(ControlId::HorizontalFlip, 1, mode, &[]).expect("hflip");
        let off = control_sequence(ControlId::HorizontalFlip, 0, mode, &[]).expect("hflip");

        assert_eq!(on, vec![RegOp::update(TIMING_CTRL_21, TIMING_CTRL_21_HFLIP, 0)]);
        assert_eq!(
            off,
            vec![RegOp::update(TIMING_CTRL_21, TIMING_CTRL_21_HFLIP, TIMING_CTRL_21_HFLIP)]
        );
    }

    #[test]
    fn test_test_pattern_menu_mapping() {
        let mode = nearest(1920, 1080);
        let ops = control_sequence(ControlId::TestPattern, 3, mode, &[]).expect("pattern");
        assert_eq!(ops, vec![RegOp::write(TEST_PATTERN, TEST_PATTERN_TYPE3)]);
        assert!(control_sequence(ControlId::TestPattern, 5, mode, &[]).is_err());
    }

    #[test]
    fn test_link_frequency_control_indexes_board_list() {
        let mode = nearest(1920, 1080);
        let freqs = [LinkFrequency::Mhz456, LinkFrequency::Mhz360];
        let ops = control_sequence(ControlId::LinkFrequency, 1, mode, &freqs).expect("link");
        assert_eq!(ops, link_frequency_sequence(LinkFrequency::Mhz360));
    }

    #[test]
    fn test_read_only_controls_are_unhandled() {
        let mode = nearest(1920, 1080);
        for id in [ControlId::PixelRate, ControlId::HorizontalBlank] {
            assert!(matches!(
                control_sequence(id, 0, mode, &[]),
                Err(SensorError::UnhandledControl(unhandled)) if unhandled == id
            ));
        }
    }
}
