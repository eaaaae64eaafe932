//! OV64A40: a driver core for the OmniVision 64 megapixel CMOS image sensor
//!
//! This library models the sensor behind trait-based collaborators: a register
//! bus and a power sequencer. Production code plugs in real hardware access,
//! while the in-memory [`mock`] implementations run the full streaming state
//! machine in tests and in the bundled binary.

pub mod config;
pub mod controls;
pub mod device;
pub mod mock;
pub mod modes;
pub mod power;
pub mod regs;
pub mod sequence;
pub mod subdev;
pub mod tables;
pub mod traits;

pub use config::{BoardConfig, SensorConfig};
pub use controls::{Control, ControlId, ControlSet, Orientation};
pub use device::{settle_delay, FormatWhich, SelectionTarget, Sensor, StreamState};
pub use modes::{LinkFrequency, Mode, Timings};
pub use subdev::SensorHandle;
pub use traits::{
    Format, FourCC, PowerControl, Rect, Reg, RegOp, RegisterBus, Result, SensorError,
};
