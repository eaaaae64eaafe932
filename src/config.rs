//! Board description parsing and validation.
//!
//! The board description states how the sensor is wired: CSI-2 lane count,
//! the link frequencies the receiver accepts, the external clock rate and the
//! supply rails. It is read from JSON and validated once at probe; anything
//! the sensor cannot support is fatal.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::controls::Orientation;
use crate::modes::LinkFrequency;
use crate::regs::{NUM_DATA_LANES, SUPPLY_NAMES, XCLK_FREQ};
use crate::traits::{Result, SensorError};

/// Board description as written by the integrator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Number of CSI-2 data lanes.
    pub data_lanes: u32,
    /// Allowed link frequencies in Hz, in menu order.
    #[serde(default)]
    pub link_frequencies: Vec<u64>,
    /// External clock rate in Hz.
    pub xclk_frequency: u32,
    /// Supply rail names wired to the sensor.
    #[serde(default)]
    pub supplies: Vec<String>,
    /// Whether a reset GPIO is wired.
    #[serde(default)]
    pub reset_gpio: bool,
    /// Mounting orientation.
    #[serde(default)]
    pub orientation: Option<Orientation>,
    /// Mounting rotation in degrees.
    #[serde(default)]
    pub rotation: Option<u32>,
}

/// Validated configuration the sensor core runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Link frequencies, one or two entries.
    pub link_frequencies: Vec<LinkFrequency>,
    /// Whether a reset GPIO is wired.
    pub reset_gpio: bool,
    /// Mounting orientation.
    pub orientation: Option<Orientation>,
    /// Mounting rotation in degrees.
    pub rotation: Option<u32>,
}

impl BoardConfig {
    /// Parse a board description from JSON.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a board description file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check the description against what the sensor supports.
    pub fn validate(&self) -> Result<SensorConfig> {
        if self.xclk_frequency != XCLK_FREQ {
            log::error!("Unsupported xclk frequency {}", self.xclk_frequency);
            return Err(SensorError::UnsupportedClockFrequency(self.xclk_frequency));
        }

        for supply in SUPPLY_NAMES {
            if !self.supplies.iter().any(|name| name == supply) {
                log::error!("Missing supply {supply}");
                return Err(SensorError::MissingSupply(supply.to_owned()));
            }
        }

        if self.data_lanes != NUM_DATA_LANES {
            log::error!("Unsupported number of data lanes: {}", self.data_lanes);
            return Err(SensorError::UnsupportedLaneCount(self.data_lanes));
        }

        if self.link_frequencies.is_empty() {
            log::warn!("no link frequencies defined");
            return Err(SensorError::NoLinkFrequencies);
        }

        if self.link_frequencies.len() > 2 {
            log::warn!("Unsupported number of link frequencies");
            return Err(SensorError::TooManyLinkFrequencies(
                self.link_frequencies.len(),
            ));
        }

        let link_frequencies = self
            .link_frequencies
            .iter()
            .map(|&hz| {
                LinkFrequency::from_hz(hz).ok_or_else(|| {
                    log::error!("Unsupported link frequency {hz}");
                    SensorError::UnsupportedLinkFrequency(hz)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SensorConfig {
            link_frequencies,
            reset_gpio: self.reset_gpio,
            orientation: self.orientation,
            rotation: self.rotation,
        })
    }
}
