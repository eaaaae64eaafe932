//! OV64A40 sensor device: probe, format negotiation, controls and streaming.

use std::thread;
use std::time::{Duration, Instant};

use crate::config::{BoardConfig, SensorConfig};
use crate::controls::{Control, ControlContext, ControlId, ControlSet};
use crate::modes::{default_mode, modes, nearest, Mode, Timings};
use crate::power::RuntimePower;
use crate::regs::{
    AUTOSUSPEND_DELAY_MS, CHIP_ID, CHIP_ID_VALUE, NATIVE_HEIGHT, NATIVE_WIDTH, PIXEL_ARRAY_HEIGHT,
    PIXEL_ARRAY_LEFT, PIXEL_ARRAY_TOP, PIXEL_ARRAY_WIDTH, PIXEL_RATE, SMIA, SMIA_STREAMING,
    XCLK_FREQ,
};
use crate::sequence;
use crate::traits::{Format, FourCC, PowerControl, Rect, RegisterBus, Result, SensorError};

/// Streaming lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Not streaming; the sensor may be powered down.
    Off,
    /// Register programs are being issued.
    Configuring,
    /// Frames are being produced.
    Streaming,
}

/// Which format state a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatWhich {
    /// Negotiation only, no effect on the device.
    Try,
    /// The format the device streams with.
    Active,
}

/// Selection rectangles the sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    /// Analogue crop of the current mode.
    Crop,
    /// Full native array.
    NativeSize,
    /// Default crop, the active pixel array.
    CropDefault,
    /// Crop bounds, the active pixel array.
    CropBounds,
}

const PIXEL_ARRAY: Rect = Rect::new(
    PIXEL_ARRAY_LEFT,
    PIXEL_ARRAY_TOP,
    PIXEL_ARRAY_WIDTH,
    PIXEL_ARRAY_HEIGHT,
);

/// Time the sensor needs after stream-on before frames reflect the programming.
///
/// At least 4096 external clock pulses (and never less than 150us) plus one
/// exposure. The sensor multiplies the programmed line length by 4.
#[must_use]
pub fn settle_delay(timings: Timings, exposure: i64) -> Duration {
    let xclk_per_us = u64::from(XCLK_FREQ) / 1_000_000;
    let pixels_per_us = PIXEL_RATE / 1_000_000;

    let startup = 4096_u64.div_ceil(xclk_per_us).max(150);
    let exposure = u64::try_from(exposure).unwrap_or(0);
    let exposure_time = (u64::from(timings.line_length) * 4 * exposure).div_ceil(pixels_per_us);

    Duration::from_micros(startup + exposure_time)
}

fn context<'a>(mode: &'static Mode, config: &'a SensorConfig) -> ControlContext<'a> {
    ControlContext {
        mode,
        link_frequencies: &config.link_frequencies,
    }
}

/// An OV64A40 sensor on a register bus.
#[derive(Debug)]
pub struct Sensor<B, P> {
    bus: B,
    power: RuntimePower<P>,
    config: SensorConfig,
    mode: &'static Mode,
    controls: ControlSet,
    state: StreamState,
    active_format: Format,
    active_crop: Rect,
    try_format: Format,
    try_crop: Rect,
}

impl<B: RegisterBus, P: PowerControl> Sensor<B, P> {
    /// Validate the board, power up, identify the chip and build the controls.
    ///
    /// The sensor is left idle with its power reference released; it powers
    /// down once the autosuspend delay expires.
    pub fn probe(mut bus: B, power: P, board: &BoardConfig) -> Result<Self> {
        let config = board.validate()?;
        let mut power = RuntimePower::new(power, Duration::from_millis(AUTOSUSPEND_DELAY_MS));

        power.resume_and_get()?;

        if let Err(err) = identify(&mut bus) {
            power.force_off();
            return Err(err);
        }

        let mode = default_mode();
        let controls = match ControlSet::new(
            &context(mode, &config),
            config.orientation,
            config.rotation,
        ) {
            Ok(controls) => controls,
            Err(err) => {
                log::error!("control init failed: {err}");
                power.force_off();
                return Err(err);
            }
        };

        let format = Format::new(mode.width, mode.height, controls.pixel_format());
        let mut sensor = Self {
            bus,
            power,
            config,
            mode,
            controls,
            state: StreamState::Off,
            active_format: format.clone(),
            active_crop: PIXEL_ARRAY,
            try_format: format,
            try_crop: PIXEL_ARRAY,
        };

        sensor.power.put_autosuspend();
        log::info!(
            "OV64A40 ready, {} link frequencies, default mode {}x{}, reset line {}",
            sensor.config.link_frequencies.len(),
            mode.width,
            mode.height,
            if sensor.config.reset_gpio { "wired" } else { "absent" }
        );

        Ok(sensor)
    }

    /// Current streaming state.
    pub const fn state(&self) -> StreamState {
        self.state
    }

    /// Whether the sensor is streaming.
    pub fn is_streaming(&self) -> bool {
        self.state == StreamState::Streaming
    }

    /// Mode the sensor is programmed with on the next stream start.
    pub const fn mode(&self) -> &'static Mode {
        self.mode
    }

    /// Validated board configuration.
    pub const fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Register bus.
    pub const fn bus(&self) -> &B {
        &self.bus
    }

    /// Mutable register bus.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    /// Runtime power handle.
    pub const fn power(&self) -> &RuntimePower<P> {
        &self.power
    }

    /// Idle-timeout callback for the deferred power release.
    pub fn suspend_if_idle(&mut self, now: Instant) -> bool {
        self.power.suspend_if_idle(now)
    }

    /// Timings of the current mode at the selected link frequency.
    pub fn timings(&self) -> Result<Timings> {
        self.controls.timings(&context(self.mode, &self.config))
    }

    // Formats

    /// Pixel format at `index`; only the flip-derived current one exists.
    pub fn enum_mbus_code(&self, index: u32) -> Result<FourCC> {
        if index != 0 {
            return Err(SensorError::InvalidArgument(format!(
                "no pixel format at index {index}"
            )));
        }
        Ok(self.controls.pixel_format())
    }

    /// Frame size of the mode at `index`, for the current pixel format only.
    pub fn enum_frame_size(&self, index: u32, fourcc: FourCC) -> Result<(u32, u32)> {
        let mode = usize::try_from(index)
            .ok()
            .and_then(|index| modes().get(index))
            .ok_or_else(|| SensorError::InvalidArgument(format!("no frame size at index {index}")))?;

        if fourcc != self.controls.pixel_format() {
            return Err(SensorError::InvalidArgument(format!(
                "pixel format {fourcc} is not the current one"
            )));
        }

        Ok((mode.width, mode.height))
    }

    /// Stored format.
    pub fn format(&self, which: FormatWhich) -> Format {
        match which {
            FormatWhich::Try => self.try_format.clone(),
            FormatWhich::Active => self.active_format.clone(),
        }
    }

    /// Negotiate a format: the nearest mode, with the flip-derived pixel format.
    ///
    /// An active request switches mode and re-derives the control ranges while
    /// not streaming. While streaming only the stored format changes.
    pub fn set_format(&mut self, which: FormatWhich, request: &Format) -> Result<Format> {
        let mode = nearest(request.width, request.height);
        let format = Format::new(mode.width, mode.height, self.controls.pixel_format());

        if which == FormatWhich::Try {
            self.try_format = format.clone();
            return Ok(format);
        }

        if std::ptr::eq(self.mode, mode) && self.active_format.fourcc == format.fourcc {
            self.active_format = format.clone();
            return Ok(format);
        }

        if self.is_streaming() {
            log::warn!(
                "Format {}x{} set while streaming, mode unchanged",
                format.width,
                format.height
            );
            self.active_format = format.clone();
            return Ok(format);
        }

        self.mode = mode;
        self.active_crop = mode.analogue_crop;
        let changed = self.controls.retime(&context(self.mode, &self.config))?;
        if let Err(err) = self.apply_if_active(&changed) {
            log::warn!("Failed to update controls for new mode: {err}");
        }
        self.active_format = format.clone();
        log::debug!("Mode set to {}x{}", mode.width, mode.height);

        Ok(format)
    }

    /// Selection rectangle for `target`.
    pub const fn selection(&self, which: FormatWhich, target: SelectionTarget) -> Rect {
        match target {
            SelectionTarget::Crop => match which {
                FormatWhich::Try => self.try_crop,
                FormatWhich::Active => self.active_crop,
            },
            SelectionTarget::NativeSize => Rect::new(0, 0, NATIVE_WIDTH, NATIVE_HEIGHT),
            SelectionTarget::CropDefault | SelectionTarget::CropBounds => PIXEL_ARRAY,
        }
    }

    // Controls

    /// The control set.
    pub const fn controls(&self) -> &ControlSet {
        &self.controls
    }

    /// One control.
    pub fn control(&self, id: ControlId) -> Result<&Control> {
        self.controls.get(id)
    }

    /// Write a control.
    ///
    /// Range, read-only and lock checks always apply. Register writes happen
    /// only while the sensor is powered; otherwise the value is stored and
    /// programmed on the next stream start.
    pub fn set_control(&mut self, id: ControlId, value: i64) -> Result<()> {
        let dirty = self
            .controls
            .set(&context(self.mode, &self.config), id, value)?;
        self.apply_if_active(&dirty)
    }

    fn apply_if_active(&mut self, ids: &[ControlId]) -> Result<()> {
        if ids.is_empty() || !self.power.get_if_active() {
            return Ok(());
        }

        let result = ids.iter().try_for_each(|&id| {
            let ctrl = self.controls.get(id)?;
            if ctrl.read_only {
                return Ok(());
            }
            self.program_control(id, ctrl.value)
        });

        self.power.put_autosuspend();
        result
    }

    fn program_control(&mut self, id: ControlId, value: i64) -> Result<()> {
        let ops =
            sequence::control_sequence(id, value, self.mode, &self.config.link_frequencies)?;
        self.bus.write_batch(&ops)
    }

    // Streaming

    /// Enable or disable streaming.
    pub fn set_stream(&mut self, enable: bool) -> Result<()> {
        if enable {
            self.start_streaming()
        } else {
            self.stop_streaming()
        }
    }

    /// Power up, program the sensor, start streaming and wait for it to settle.
    ///
    /// Blocks for the settle delay. On failure the power reference is released
    /// and the sensor stays off.
    pub fn start_streaming(&mut self) -> Result<()> {
        if self.state != StreamState::Off {
            log::warn!("Stream start requested while {:?}", self.state);
            return Ok(());
        }

        self.power.resume_and_get()?;
        self.state = StreamState::Configuring;

        let delay = match self.program_stream() {
            Ok(delay) => delay,
            Err(err) => {
                log::error!("Failed to start streaming: {err}");
                self.power.put_autosuspend();
                self.state = StreamState::Off;
                return Err(err);
            }
        };

        // Link frequency and flips cannot change while streaming.
        self.controls.grab(true);
        self.state = StreamState::Streaming;

        log::debug!(
            "Streaming {}x{}, settling for {}us",
            self.mode.width,
            self.mode.height,
            delay.as_micros()
        );
        thread::sleep(delay);

        Ok(())
    }

    /// Issue the full register program and enable the stream; returns the settle delay.
    fn program_stream(&mut self) -> Result<Duration> {
        let timings = self.timings()?;

        self.bus.write_batch(sequence::init_sequence())?;
        self.bus.write_batch(sequence::mode_sequence(self.mode))?;
        self.bus
            .write_batch(&sequence::geometry_sequence(self.mode, timings))?;

        for (id, value) in self.controls.setup_values() {
            self.program_control(id, value)?;
        }

        self.bus.write(SMIA, SMIA_STREAMING)?;

        let exposure = self.controls.value(ControlId::Exposure)?;
        Ok(settle_delay(timings, exposure))
    }

    /// Stop streaming. Never fails once streaming; a failed register write is
    /// logged and the power reference is released regardless.
    pub fn stop_streaming(&mut self) -> Result<()> {
        if self.state != StreamState::Streaming {
            log::debug!("Stream stop requested while {:?}", self.state);
            return Ok(());
        }

        if let Err(err) = self.bus.update_bits(SMIA, SMIA_STREAMING, 0) {
            log::warn!("Failed to clear stream enable: {err}");
        }
        self.power.put_autosuspend();
        self.controls.grab(false);
        self.state = StreamState::Off;
        log::debug!("Streaming stopped");

        Ok(())
    }

    /// Tear down: stop streaming and power off immediately.
    pub fn remove(mut self) -> (B, P) {
        if let Err(err) = self.stop_streaming() {
            log::warn!("Failed to stop streaming on removal: {err}");
        }
        self.power.force_off();
        (self.bus, self.power.into_inner())
    }
}

fn identify<B: RegisterBus>(bus: &mut B) -> Result<()> {
    let id = bus.read(CHIP_ID).inspect_err(|err| {
        log::error!("Failed to read chip id: {err}");
    })?;

    if id != CHIP_ID_VALUE {
        log::error!("chip id mismatch: {id:#x}");
        return Err(SensorError::ChipIdMismatch {
            expected: CHIP_ID_VALUE,
            found: id,
        });
    }

    log::debug!("OV64A40 chip identified: {id:#x}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPower, SimulatedBus};
    use crate::modes::LinkFrequency;
    use crate::regs::{
        EXPOSURE_MARGIN, PLL1_MULTIPLIER, PLL1_MULTIPLIER_360M, TIMING_CTRLE, TIMINGS_VTS_LOW,
    };
    use crate::traits::RegOp;

    fn board() -> BoardConfig {
        BoardConfig::from_json_str(
            r#"{"data_lanes": 2, "link_frequencies": [456000000, 360000000],
                "xclk_frequency": 24000000, "supplies": ["avdd", "dovdd", "dvdd"]}"#,
        )
        .expect("board parses")
    }

    fn sensor() -> Sensor<SimulatedBus, MockPower> {
        Sensor::probe(SimulatedBus::new(), MockPower::new(), &board()).expect("probe")
    }

    #[test]
    fn test_settle_delay_formula() {
        let timings = Timings {
            line_length: 880,
            frame_length: 1397,
        };
        // ceil(4096 / 24) = 171 > 150; ceil(880 * 4 * 16 / 300) = 188.
        assert_eq!(settle_delay(timings, 16), Duration::from_micros(171 + 188));
        assert_eq!(settle_delay(timings, 0), Duration::from_micros(171));
    }

    #[test]
    fn test_probe_defaults() {
        let sensor = sensor();
        assert_eq!(sensor.state(), StreamState::Off);
        assert_eq!(sensor.mode().width, 9248);
        assert_eq!(sensor.format(FormatWhich::Active).fourcc, FourCC::SBGGR10);
        assert_eq!(sensor.selection(FormatWhich::Active, SelectionTarget::Crop), PIXEL_ARRAY);
        assert!(sensor.power().is_active());
        assert_eq!(sensor.power().usage(), 0);
        assert!(sensor.power().idle_deadline().is_some());
    }

    #[test]
    fn test_probe_rejects_wrong_chip() {
        let result = Sensor::probe(
            SimulatedBus::new().with_chip_id(0x0056_6440),
            MockPower::new(),
            &board(),
        );
        assert!(matches!(
            result,
            Err(SensorError::ChipIdMismatch { found: 0x0056_6440, .. })
        ));
    }

    #[test]
    fn test_probe_rejects_power_failure() {
        let result = Sensor::probe(SimulatedBus::new(), MockPower::new().failing_power_on(), &board());
        assert!(matches!(result, Err(SensorError::Power(_))));
    }

    #[test]
    fn test_try_format_has_no_side_effect() {
        let mut sensor = sensor();
        let request = Format::new(1920, 1200, FourCC::SRGGB10);
        let format = sensor
            .set_format(FormatWhich::Try, &request)
            .expect("try format");

        assert_eq!((format.width, format.height), (1920, 1080));
        assert_eq!(format.fourcc, FourCC::SBGGR10);
        assert_eq!(sensor.mode().width, 9248);
        assert_eq!(sensor.format(FormatWhich::Try), format);
        assert_eq!(sensor.format(FormatWhich::Active).width, 9248);
    }

    #[test]
    fn test_active_format_switches_mode_and_crop() {
        let mut sensor = sensor();
        let format = sensor
            .set_format(FormatWhich::Active, &Format::new(3800, 2100, FourCC::SBGGR10))
            .expect("set format");

        assert_eq!((format.width, format.height), (3840, 2160));
        assert_eq!(sensor.mode().width, 3840);
        assert_eq!(
            sensor.selection(FormatWhich::Active, SelectionTarget::Crop),
            Rect::new(784, 1312, 7712, 4352)
        );
        assert_eq!(
            sensor.control(ControlId::Exposure).expect("exposure").maximum,
            2218 - EXPOSURE_MARGIN
        );
    }

    #[test]
    fn test_mode_change_while_powered_programs_vblank() {
        let mut sensor = sensor();
        sensor.bus_mut().clear_log();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");

        // 1080p at 456 MHz: default vblank 317 gives a frame length of 1397.
        assert!(sensor
            .bus()
            .position(TIMINGS_VTS_LOW, 1397 & 0xff)
            .is_some());
    }

    #[test]
    fn test_enum_codes_and_sizes() {
        let sensor = sensor();
        assert_eq!(sensor.enum_mbus_code(0).expect("code"), FourCC::SBGGR10);
        assert!(sensor.enum_mbus_code(1).is_err());

        assert_eq!(
            sensor.enum_frame_size(5, FourCC::SBGGR10).expect("size"),
            (1920, 1080)
        );
        assert!(sensor.enum_frame_size(6, FourCC::SBGGR10).is_err());
        assert!(sensor.enum_frame_size(0, FourCC::SRGGB10).is_err());
    }

    #[test]
    fn test_selection_targets() {
        let sensor = sensor();
        assert_eq!(
            sensor.selection(FormatWhich::Active, SelectionTarget::NativeSize),
            Rect::new(0, 0, 9286, 6976)
        );
        assert_eq!(
            sensor.selection(FormatWhich::Active, SelectionTarget::CropBounds),
            Rect::new(0, 0, 9248, 6944)
        );
        assert_eq!(
            sensor.selection(FormatWhich::Try, SelectionTarget::CropDefault),
            Rect::new(0, 0, 9248, 6944)
        );
    }

    #[test]
    fn test_control_write_while_powered_down_is_stored_only() {
        let mut sensor = sensor();
        let deadline = sensor.power().idle_deadline().expect("deadline armed");
        assert!(sensor.suspend_if_idle(deadline));
        sensor.bus_mut().clear_log();

        sensor
            .set_control(ControlId::AnalogueGain, 0x100)
            .expect("gain");
        assert!(sensor.bus().writes().is_empty());
        assert_eq!(
            sensor.control(ControlId::AnalogueGain).expect("gain").value,
            0x100
        );
        assert!(sensor.set_control(ControlId::AnalogueGain, 0x800).is_err());
    }

    #[test]
    fn test_start_programs_in_order_and_stop_releases() {
        let mut sensor = sensor();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");
        sensor.set_control(ControlId::LinkFrequency, 1).expect("link");
        sensor.bus_mut().clear_log();

        sensor.start_streaming().expect("start");
        assert_eq!(sensor.state(), StreamState::Streaming);
        assert_eq!(sensor.power().usage(), 1);

        let bus = sensor.bus();
        let vts = bus.position(TIMING_CTRLE, 1216).expect("vts programmed");
        let pll = bus
            .position(PLL1_MULTIPLIER, PLL1_MULTIPLIER_360M)
            .expect("reduced multiplier");
        let stream_on = bus.position(SMIA, SMIA_STREAMING).expect("stream on");
        assert!(vts < pll);
        assert!(pll < stream_on);
        assert_eq!(bus.writes().last(), Some(&RegOp::write(SMIA, SMIA_STREAMING)));

        sensor.stop_streaming().expect("stop");
        assert_eq!(sensor.state(), StreamState::Off);
        assert_eq!(sensor.power().usage(), 0);
        assert_eq!(sensor.bus().value(SMIA), 0);
    }

    #[test]
    fn test_start_failure_unwinds() {
        let mut sensor = sensor();
        sensor.bus_mut().fail_writes_to(TIMING_CTRLE.addr);

        assert!(sensor.start_streaming().is_err());
        assert_eq!(sensor.state(), StreamState::Off);
        assert_eq!(sensor.power().usage(), 0);
        assert!(sensor.bus().position(SMIA, SMIA_STREAMING).is_none());

        sensor.bus_mut().clear_failure();
        sensor.start_streaming().expect("retry by caller");
        assert!(sensor.is_streaming());
    }

    #[test]
    fn test_format_while_streaming_keeps_mode() {
        let mut sensor = sensor();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");
        sensor.start_streaming().expect("start");

        let format = sensor
            .set_format(FormatWhich::Active, &Format::new(2312, 1736, FourCC::SBGGR10))
            .expect("format accepted");
        assert_eq!(format.width, 2312);
        assert_eq!(sensor.format(FormatWhich::Active).width, 2312);
        assert_eq!(sensor.mode().width, 1920);
        assert_eq!(
            sensor.timings().expect("timings"),
            sensor.mode().timings(LinkFrequency::Mhz456)
        );
    }

    #[test]
    fn test_format_back_to_streaming_mode_restores_stored_format() {
        let mut sensor = sensor();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");
        sensor.start_streaming().expect("start");

        sensor
            .set_format(FormatWhich::Active, &Format::new(2312, 1736, FourCC::SBGGR10))
            .expect("metadata update");
        let format = sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("back to streaming mode");

        assert_eq!((format.width, format.height), (1920, 1080));
        assert_eq!(sensor.format(FormatWhich::Active), format);
        assert_eq!(sensor.mode().width, 1920);
    }

    #[test]
    fn test_double_start_and_stop_are_harmless() {
        let mut sensor = sensor();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");
        sensor.stop_streaming().expect("stop while off");
        assert_eq!(sensor.power().usage(), 0);

        sensor.start_streaming().expect("start");
        sensor.start_streaming().expect("second start");
        assert_eq!(sensor.power().usage(), 1);
    }

    #[test]
    fn test_remove_powers_off() {
        let mut sensor = sensor();
        sensor
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("set format");
        sensor.start_streaming().expect("start");

        let (_bus, power) = sensor.remove();
        assert_eq!(power.power_off_count(), 1);
    }
}
