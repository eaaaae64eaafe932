//! Serialized entry points.
//!
//! Format, control, streaming and power-timeout callers may arrive from
//! different threads. [`SensorHandle`] runs each of them under one lock so a
//! control write never interleaves with a stream start.

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::controls::{Control, ControlId};
use crate::device::{FormatWhich, SelectionTarget, Sensor, StreamState};
use crate::traits::{Format, FourCC, PowerControl, Rect, RegisterBus, Result, SensorError};

/// Thread-safe wrapper around a [`Sensor`].
#[derive(Debug)]
pub struct SensorHandle<B, P> {
    sensor: Mutex<Sensor<B, P>>,
}

impl<B: RegisterBus, P: PowerControl> SensorHandle<B, P> {
    /// Take ownership of a probed sensor.
    pub const fn new(sensor: Sensor<B, P>) -> Self {
        Self {
            sensor: Mutex::new(sensor),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Sensor<B, P>>> {
        self.sensor.lock().map_err(|_| SensorError::LockPoisoned)
    }

    /// Run `f` with exclusive access to the sensor.
    pub fn with<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Sensor<B, P>) -> Result<R>,
    {
        let mut sensor = self.lock()?;
        f(&mut sensor)
    }

    /// See [`Sensor::enum_mbus_code`].
    pub fn enum_mbus_code(&self, index: u32) -> Result<FourCC> {
        self.lock()?.enum_mbus_code(index)
    }

    /// See [`Sensor::enum_frame_size`].
    pub fn enum_frame_size(&self, index: u32, fourcc: FourCC) -> Result<(u32, u32)> {
        self.lock()?.enum_frame_size(index, fourcc)
    }

    /// See [`Sensor::format`].
    pub fn format(&self, which: FormatWhich) -> Result<Format> {
        Ok(self.lock()?.format(which))
    }

    /// See [`Sensor::set_format`].
    pub fn set_format(&self, which: FormatWhich, request: &Format) -> Result<Format> {
        self.lock()?.set_format(which, request)
    }

    /// See [`Sensor::selection`].
    pub fn selection(&self, which: FormatWhich, target: SelectionTarget) -> Result<Rect> {
        Ok(self.lock()?.selection(which, target))
    }

    /// Snapshot of one control.
    pub fn control(&self, id: ControlId) -> Result<Control> {
        self.lock()?.control(id).cloned()
    }

    /// See [`Sensor::set_control`].
    pub fn set_control(&self, id: ControlId, value: i64) -> Result<()> {
        self.lock()?.set_control(id, value)
    }

    /// See [`Sensor::set_stream`].
    pub fn set_stream(&self, enable: bool) -> Result<()> {
        self.lock()?.set_stream(enable)
    }

    /// Current streaming state.
    pub fn state(&self) -> Result<StreamState> {
        Ok(self.lock()?.state())
    }

    /// Idle-timeout callback.
    pub fn suspend_if_idle(&self, now: Instant) -> Result<bool> {
        Ok(self.lock()?.suspend_if_idle(now))
    }

    /// Recover the sensor.
    pub fn into_inner(self) -> Result<Sensor<B, P>> {
        self.sensor.into_inner().map_err(|_| SensorError::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::config::BoardConfig;
    use crate::mock::{MockPower, SimulatedBus};

    fn handle() -> SensorHandle<SimulatedBus, MockPower> {
        let board = BoardConfig::from_json_str(
            r#"{"data_lanes": 2, "link_frequencies": [456000000],
                "xclk_frequency": 24000000, "supplies": ["avdd", "dovdd", "dvdd"]}"#,
        )
        .expect("board parses");
        let sensor =
            Sensor::probe(SimulatedBus::new(), MockPower::new(), &board).expect("probe");
        SensorHandle::new(sensor)
    }

    #[test]
    fn test_concurrent_control_writes() {
        let handle = Arc::new(handle());
        let workers: Vec<_> = (0..4_i64)
            .map(|n| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || {
                    handle
                        .set_control(ControlId::AnalogueGain, 0x100 + n)
                        .expect("gain write");
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker");
        }

        let gain = handle.control(ControlId::AnalogueGain).expect("gain");
        assert!((0x100..0x104).contains(&gain.value));
    }

    #[test]
    fn test_stream_through_handle() {
        let handle = handle();
        handle
            .set_format(FormatWhich::Active, &Format::new(1920, 1080, FourCC::SBGGR10))
            .expect("format");
        handle.set_stream(true).expect("start");
        assert_eq!(handle.state().expect("state"), StreamState::Streaming);
        assert!(matches!(
            handle.set_control(ControlId::VerticalFlip, 1),
            Err(SensorError::ControlLocked(ControlId::VerticalFlip))
        ));
        handle.set_stream(false).expect("stop");

        let sensor = handle.into_inner().expect("not poisoned");
        assert_eq!(sensor.power().usage(), 0);
    }
}
