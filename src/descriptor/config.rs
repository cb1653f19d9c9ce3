//! Configuration for Scan Context construction.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Polar binning parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DescriptorConfig {
    /// Number of radial rings (rows).
    /// Default: 20
    #[serde(default = "default_num_rings")]
    pub num_rings: usize,

    /// Number of angular sectors (columns), spanning 2π from +X.
    /// Default: 60
    #[serde(default = "default_num_sectors")]
    pub num_sectors: usize,

    /// Maximum planar range (meters). Points beyond are discarded.
    /// Default: 80.0
    #[serde(default = "default_max_radius")]
    pub max_radius: f64,

    /// Height of the sensor above ground (meters), added to every z so
    /// that ground returns land near zero. Set to 0 for clouds already in
    /// the robot base frame.
    /// Default: 2.0
    #[serde(default = "default_sensor_height")]
    pub sensor_height: f64,
}

fn default_num_rings() -> usize {
    20
}

fn default_num_sectors() -> usize {
    60
}

fn default_max_radius() -> f64 {
    80.0
}

fn default_sensor_height() -> f64 {
    2.0
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            num_rings: default_num_rings(),
            num_sectors: default_num_sectors(),
            max_radius: default_max_radius(),
            sensor_height: default_sensor_height(),
        }
    }
}

impl DescriptorConfig {
    /// Radial width of one ring (meters).
    #[inline]
    pub fn ring_width(&self) -> f64 {
        self.max_radius / self.num_rings as f64
    }

    /// Angular width of one sector (radians).
    #[inline]
    pub fn sector_angle(&self) -> f64 {
        std::f64::consts::TAU / self.num_sectors as f64
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.num_rings == 0 {
            return Err(Error::InvalidConfig("num_rings must be > 0".into()));
        }
        if self.num_sectors == 0 {
            return Err(Error::InvalidConfig("num_sectors must be > 0".into()));
        }
        if !(self.max_radius.is_finite() && self.max_radius > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max_radius must be positive, got {}",
                self.max_radius
            )));
        }
        if !self.sensor_height.is_finite() {
            return Err(Error::InvalidConfig("sensor_height must be finite".into()));
        }
        Ok(())
    }
}
