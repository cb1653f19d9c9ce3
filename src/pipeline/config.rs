//! Closure pipeline policy.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Acceptance thresholds and factor weights used between place recognition
/// and the pose graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Match distance below which a candidate is recorded as a closure.
    /// Default: 0.4
    #[serde(default = "default_closure_threshold")]
    pub closure_threshold: f64,

    /// Diagonal of the odometry information matrix.
    /// Default: 1.0
    #[serde(default = "default_odometry_information")]
    pub odometry_information: f64,

    /// Diagonal of the loop-closure information matrix.
    /// Default: 1000.0
    #[serde(default = "default_closure_information")]
    pub closure_information: f64,

    /// Minimum verifier fitness for a closure to become a factor.
    /// Default: 0.5
    #[serde(default = "default_min_fitness")]
    pub min_fitness: f64,

    /// Distance thresholds evaluated for precision/recall.
    /// Default: 0.10, 0.15, ..., 0.95
    #[serde(default = "default_evaluation_thresholds")]
    pub evaluation_thresholds: Vec<f64>,
}

fn default_closure_threshold() -> f64 {
    0.4
}

fn default_odometry_information() -> f64 {
    1.0
}

fn default_closure_information() -> f64 {
    1000.0
}

fn default_min_fitness() -> f64 {
    0.5
}

fn default_evaluation_thresholds() -> Vec<f64> {
    (0..18).map(|i| 0.1 + 0.05 * i as f64).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            closure_threshold: default_closure_threshold(),
            odometry_information: default_odometry_information(),
            closure_information: default_closure_information(),
            min_fitness: default_min_fitness(),
            evaluation_thresholds: default_evaluation_thresholds(),
        }
    }
}

impl PipelineConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if !(self.odometry_information.is_finite() && self.odometry_information > 0.0) {
            return Err(Error::InvalidConfig(
                "odometry_information must be positive".into(),
            ));
        }
        if !(self.closure_information.is_finite() && self.closure_information > 0.0) {
            return Err(Error::InvalidConfig(
                "closure_information must be positive".into(),
            ));
        }
        if !self.closure_threshold.is_finite() || !self.min_fitness.is_finite() {
            return Err(Error::InvalidConfig("thresholds must be finite".into()));
        }
        Ok(())
    }
}
