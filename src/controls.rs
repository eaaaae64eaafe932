//! Control coordination.
//!
//! [`ControlSet`] owns the value and range of every user-facing control and
//! keeps the timing-derived ones consistent: horizontal blank follows the line
//! length, vertical blank follows the frame length, and the exposure ceiling
//! follows the current frame length. Operations take a [`ControlContext`]
//! describing the active mode and the board's link frequencies instead of
//! reaching back into the device.

use std::fmt;

use crate::modes::{LinkFrequency, Mode, Timings};
use crate::regs::{
    ANA_GAIN_DEFAULT, ANA_GAIN_MAX, ANA_GAIN_MIN, EXPOSURE_MARGIN, EXPOSURE_MIN, PIXEL_RATE,
    VBLANK_MIN, VTS_MAX,
};
use crate::traits::{FourCC, Result, SensorError};

/// Test pattern menu entries.
pub const TEST_PATTERN_MENU: [&str; 5] = ["Disabled", "Type1", "Type2", "Type3", "Type4"];

/// Camera orientation menu entries.
pub const ORIENTATION_MENU: [&str; 3] = ["Front", "Back", "External"];

/// Output pixel formats, indexed by `hflip << 1 | vflip`.
pub const PIXEL_FORMATS: [FourCC; 4] = [
    FourCC::SBGGR10,
    FourCC::SGRBG10,
    FourCC::SGBRG10,
    FourCC::SRGGB10,
];

/// Identifier of a sensor control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlId {
    /// Output pixel rate (read-only).
    PixelRate,
    /// Link frequency menu, indexing the board's frequency list.
    LinkFrequency,
    /// Test pattern menu.
    TestPattern,
    /// Exposure in lines.
    Exposure,
    /// Horizontal blanking in pixels (read-only, derived).
    HorizontalBlank,
    /// Vertical blanking in lines.
    VerticalBlank,
    /// Analogue gain code.
    AnalogueGain,
    /// Horizontal mirror.
    HorizontalFlip,
    /// Vertical flip.
    VerticalFlip,
    /// Mounting orientation from the board description (read-only).
    CameraOrientation,
    /// Mounting rotation in degrees from the board description (read-only).
    CameraSensorRotation,
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PixelRate => "Pixel Rate",
            Self::LinkFrequency => "Link Frequency",
            Self::TestPattern => "Test Pattern",
            Self::Exposure => "Exposure",
            Self::HorizontalBlank => "Horizontal Blanking",
            Self::VerticalBlank => "Vertical Blanking",
            Self::AnalogueGain => "Analogue Gain",
            Self::HorizontalFlip => "Horizontal Flip",
            Self::VerticalFlip => "Vertical Flip",
            Self::CameraOrientation => "Camera Orientation",
            Self::CameraSensorRotation => "Camera Sensor Rotation",
        };
        f.write_str(name)
    }
}

/// Value type of a control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlKind {
    /// Plain integer.
    Integer,
    /// 0 or 1.
    Boolean,
    /// Index into named items.
    Menu(&'static [&'static str]),
    /// Index into integer items.
    IntegerMenu(Vec<i64>),
}

/// Live state of one control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Identifier.
    pub id: ControlId,
    /// Value type.
    pub kind: ControlKind,
    /// Current minimum.
    pub minimum: i64,
    /// Current maximum.
    pub maximum: i64,
    /// Step between valid values.
    pub step: i64,
    /// Current default.
    pub default: i64,
    /// Current value.
    pub value: i64,
    /// Writes are always rejected.
    pub read_only: bool,
    /// Writes are rejected while streaming.
    pub grabbed: bool,
    /// Changing the value changes the output pixel format.
    pub modifies_layout: bool,
}

impl Control {
    fn new(id: ControlId, kind: ControlKind, minimum: i64, maximum: i64, default: i64) -> Self {
        Self {
            id,
            kind,
            minimum,
            maximum,
            step: 1,
            default,
            value: default,
            read_only: false,
            grabbed: false,
            modifies_layout: false,
        }
    }

    fn fixed(id: ControlId, kind: ControlKind, value: i64) -> Self {
        Self {
            read_only: true,
            ..Self::new(id, kind, value, value, value)
        }
    }

    /// Replace the range and default, clamping the value into the new range.
    ///
    /// Returns whether the value changed.
    fn modify_range(&mut self, minimum: i64, maximum: i64, default: i64) -> bool {
        self.minimum = minimum;
        self.maximum = maximum;
        self.default = default;

        let clamped = self.value.clamp(minimum, maximum);
        let changed = clamped != self.value;
        self.value = clamped;
        changed
    }
}

/// Mounting orientation reported by the board description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Facing the user.
    Front,
    /// Facing away from the user.
    Back,
    /// Not fixed to the device.
    External,
}

impl Orientation {
    const fn menu_index(self) -> i64 {
        match self {
            Self::Front => 0,
            Self::Back => 1,
            Self::External => 2,
        }
    }
}

/// Device state the coordinator needs to derive ranges.
#[derive(Debug, Clone, Copy)]
pub struct ControlContext<'a> {
    /// Active capture mode.
    pub mode: &'static Mode,
    /// Board link frequencies, in the order the link frequency menu exposes.
    pub link_frequencies: &'a [LinkFrequency],
}

/// The sensor's control set.
#[derive(Debug, Clone)]
pub struct ControlSet {
    controls: Vec<Control>,
}

impl ControlSet {
    /// Build the control set for the context's mode at link frequency index 0.
    pub fn new(
        ctx: &ControlContext<'_>,
        orientation: Option<Orientation>,
        rotation: Option<u32>,
    ) -> Result<Self> {
        let first = ctx
            .link_frequencies
            .first()
            .copied()
            .ok_or(SensorError::NoLinkFrequencies)?;
        let timings = ctx.mode.timings(first);
        let height = i64::from(ctx.mode.height);
        let frame_length = i64::from(timings.frame_length);
        let freq_items: Vec<i64> = ctx
            .link_frequencies
            .iter()
            .map(|freq| i64::try_from(freq.hz()).unwrap_or(i64::MAX))
            .collect();
        let last_freq = i64::try_from(freq_items.len()).unwrap_or(1) - 1;
        let pixel_rate = i64::try_from(PIXEL_RATE).unwrap_or(i64::MAX);
        let hblank = hblank_for(ctx.mode, timings);

        let mut controls = vec![
            Control::fixed(ControlId::PixelRate, ControlKind::Integer, pixel_rate),
            Control::new(
                ControlId::LinkFrequency,
                ControlKind::IntegerMenu(freq_items),
                0,
                last_freq,
                0,
            ),
            Control::new(
                ControlId::TestPattern,
                ControlKind::Menu(&TEST_PATTERN_MENU),
                0,
                4,
                0,
            ),
            Control::new(
                ControlId::Exposure,
                ControlKind::Integer,
                EXPOSURE_MIN,
                frame_length - EXPOSURE_MARGIN,
                EXPOSURE_MIN,
            ),
            Control::fixed(ControlId::HorizontalBlank, ControlKind::Integer, hblank),
            Control::new(
                ControlId::VerticalBlank,
                ControlKind::Integer,
                VBLANK_MIN,
                VTS_MAX - height,
                frame_length - height,
            ),
            Control::new(
                ControlId::AnalogueGain,
                ControlKind::Integer,
                ANA_GAIN_MIN,
                ANA_GAIN_MAX,
                ANA_GAIN_DEFAULT,
            ),
            Control {
                modifies_layout: true,
                ..Control::new(ControlId::HorizontalFlip, ControlKind::Boolean, 0, 1, 0)
            },
            Control {
                modifies_layout: true,
                ..Control::new(ControlId::VerticalFlip, ControlKind::Boolean, 0, 1, 0)
            },
        ];

        if let Some(orientation) = orientation {
            controls.push(Control::fixed(
                ControlId::CameraOrientation,
                ControlKind::Menu(&ORIENTATION_MENU),
                orientation.menu_index(),
            ));
        }
        if let Some(rotation) = rotation {
            controls.push(Control::fixed(
                ControlId::CameraSensorRotation,
                ControlKind::Integer,
                i64::from(rotation),
            ));
        }

        Ok(Self { controls })
    }

    /// All controls in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    /// Look up a control.
    pub fn get(&self, id: ControlId) -> Result<&Control> {
        self.controls
            .iter()
            .find(|ctrl| ctrl.id == id)
            .ok_or(SensorError::UnknownControl(id))
    }

    fn get_mut(&mut self, id: ControlId) -> Result<&mut Control> {
        self.controls
            .iter_mut()
            .find(|ctrl| ctrl.id == id)
            .ok_or(SensorError::UnknownControl(id))
    }

    /// Current value of a control.
    pub fn value(&self, id: ControlId) -> Result<i64> {
        self.get(id).map(|ctrl| ctrl.value)
    }

    /// Link frequency currently selected by the menu control.
    pub fn link_frequency(&self, ctx: &ControlContext<'_>) -> Result<LinkFrequency> {
        let index = self.value(ControlId::LinkFrequency)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| ctx.link_frequencies.get(index))
            .copied()
            .ok_or_else(|| {
                SensorError::InvalidArgument(format!("link frequency index {index} not configured"))
            })
    }

    /// Timings of the context's mode at the selected link frequency.
    pub fn timings(&self, ctx: &ControlContext<'_>) -> Result<Timings> {
        Ok(ctx.mode.timings(self.link_frequency(ctx)?))
    }

    /// Pixel format matching the current flip state.
    pub fn pixel_format(&self) -> FourCC {
        let hflip = self.value(ControlId::HorizontalFlip).unwrap_or(0) != 0;
        let vflip = self.value(ControlId::VerticalFlip).unwrap_or(0) != 0;
        let index = (usize::from(hflip) << 1) | usize::from(vflip);
        PIXEL_FORMATS.get(index).copied().unwrap_or(FourCC::SBGGR10)
    }

    /// Validate and store a user write.
    ///
    /// Returns the controls whose register state must be refreshed, in the
    /// order they should be applied. An unchanged value needs no refresh.
    pub fn set(
        &mut self,
        ctx: &ControlContext<'_>,
        id: ControlId,
        value: i64,
    ) -> Result<Vec<ControlId>> {
        let ctrl = self.get_mut(id)?;
        if ctrl.read_only {
            return Err(SensorError::ReadOnly(id));
        }
        if ctrl.grabbed {
            return Err(SensorError::ControlLocked(id));
        }
        if value < ctrl.minimum || value > ctrl.maximum {
            return Err(SensorError::OutOfRange {
                id,
                value,
                min: ctrl.minimum,
                max: ctrl.maximum,
            });
        }
        if ctrl.value == value {
            return Ok(Vec::new());
        }

        let mut dirty = Vec::new();
        match id {
            ControlId::VerticalBlank => {
                if self.store_vblank(ctx.mode, value)? {
                    dirty.push(ControlId::Exposure);
                }
                dirty.push(id);
            }
            ControlId::LinkFrequency => {
                self.get_mut(id)?.value = value;
                dirty.push(id);
                for retimed in self.retime(ctx)? {
                    if !dirty.contains(&retimed) {
                        dirty.push(retimed);
                    }
                }
            }
            _ => {
                self.get_mut(id)?.value = value;
                dirty.push(id);
            }
        }

        Ok(dirty)
    }

    /// Re-derive the timing-dependent ranges after a mode or link frequency change.
    ///
    /// Vertical blank is reset to the new default, the exposure ceiling moves to
    /// the new frame length (clamping the value) and horizontal blank collapses
    /// to the new line length. Returns the controls whose value changed.
    pub fn retime(&mut self, ctx: &ControlContext<'_>) -> Result<Vec<ControlId>> {
        let timings = self.timings(ctx)?;
        let height = i64::from(ctx.mode.height);
        let frame_length = i64::from(timings.frame_length);
        let vblank_def = frame_length - height;
        let mut changed = Vec::new();

        let vblank = self.get_mut(ControlId::VerticalBlank)?;
        let mut vblank_changed = vblank.modify_range(VBLANK_MIN, VTS_MAX - height, vblank_def);
        if vblank.value != vblank_def {
            vblank_changed = true;
        }
        if self.store_vblank(ctx.mode, vblank_def)? {
            changed.push(ControlId::Exposure);
        }
        if vblank_changed {
            changed.push(ControlId::VerticalBlank);
        }

        let exposure = self.get_mut(ControlId::Exposure)?;
        let exposure_changed =
            exposure.modify_range(EXPOSURE_MIN, frame_length - EXPOSURE_MARGIN, EXPOSURE_MIN);
        if exposure_changed && !changed.contains(&ControlId::Exposure) {
            changed.push(ControlId::Exposure);
        }

        let hblank = hblank_for(ctx.mode, timings);
        let hblank_ctrl = self.get_mut(ControlId::HorizontalBlank)?;
        if hblank_ctrl.modify_range(hblank, hblank, hblank) {
            changed.push(ControlId::HorizontalBlank);
        }

        Ok(changed)
    }

    /// Lock or unlock the controls that cannot change while streaming.
    pub fn grab(&mut self, grabbed: bool) {
        for ctrl in &mut self.controls {
            if matches!(
                ctrl.id,
                ControlId::LinkFrequency | ControlId::HorizontalFlip | ControlId::VerticalFlip
            ) {
                ctrl.grabbed = grabbed;
            }
        }
    }

    /// Writable controls with their values, in the order a full setup applies them.
    pub fn setup_values(&self) -> Vec<(ControlId, i64)> {
        self.controls
            .iter()
            .filter(|ctrl| !ctrl.read_only)
            .map(|ctrl| (ctrl.id, ctrl.value))
            .collect()
    }

    /// Store a vertical blank value and pull the exposure ceiling along.
    ///
    /// The exposure value is only ever clamped down; a later larger blank does
    /// not restore it. Returns whether the exposure value changed.
    fn store_vblank(&mut self, mode: &Mode, value: i64) -> Result<bool> {
        self.get_mut(ControlId::VerticalBlank)?.value = value;

        let exposure = self.get_mut(ControlId::Exposure)?;
        let exp_max = i64::from(mode.height) + value - EXPOSURE_MARGIN;
        let exp_val = exposure.value.min(exp_max);
        let minimum = exposure.minimum;
        Ok(exposure.modify_range(minimum, exp_max, exp_val))
    }
}

/// Horizontal blank implied by `timings`; the sensor multiplies line length by 4.
#[must_use]
pub fn hblank_for(mode: &Mode, timings: Timings) -> i64 {
    i64::from(timings.line_length) * 4 - i64::from(mode.width)
}
