//! Configuration for the place index and matcher.

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorConfig;
use crate::error::{Error, Result};

/// Coarse retrieval structure over ring keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalBackend {
    /// Linear scan over all stored keys.
    BruteForce,
    /// k-d tree over ring keys (falls back to brute force for ring counts
    /// without a compiled tree dimension).
    #[default]
    KdTree,
}

/// Place index and matcher parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaceConfig {
    /// Minimum id distance between a query and an eligible candidate.
    /// Default: 50
    #[serde(default = "default_exclusion_window")]
    pub exclusion_window: usize,

    /// Number of ring-key neighbours passed to fine matching.
    /// Default: 10
    #[serde(default = "default_num_candidates")]
    pub num_candidates: usize,

    /// Coarse retrieval backend.
    /// Default: kd_tree
    #[serde(default)]
    pub retrieval: RetrievalBackend,

    /// Fraction of the sectors scored around the sector-key alignment.
    /// `None` scores every shift.
    /// Default: None
    #[serde(default)]
    pub search_ratio: Option<f64>,
}

fn default_exclusion_window() -> usize {
    50
}

fn default_num_candidates() -> usize {
    10
}

impl Default for PlaceConfig {
    fn default() -> Self {
        Self {
            exclusion_window: default_exclusion_window(),
            num_candidates: default_num_candidates(),
            retrieval: RetrievalBackend::default(),
            search_ratio: None,
        }
    }
}

impl PlaceConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.exclusion_window == 0 {
            return Err(Error::InvalidConfig(
                "exclusion_window must be >= 1 (a scan would match itself)".into(),
            ));
        }
        if self.num_candidates == 0 {
            return Err(Error::InvalidConfig("num_candidates must be > 0".into()));
        }
        if let Some(ratio) = self.search_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(Error::InvalidConfig(format!(
                    "search_ratio must be in (0, 1], got {}",
                    ratio
                )));
            }
        }
        Ok(())
    }
}

/// Everything [`super::ScanContextManager`] needs.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanContextConfig {
    /// Descriptor geometry.
    #[serde(default)]
    pub descriptor: DescriptorConfig,

    /// Retrieval and matching.
    #[serde(default)]
    pub place: PlaceConfig,
}

impl ScanContextConfig {
    /// Validate both halves.
    pub fn validate(&self) -> Result<()> {
        self.descriptor.validate()?;
        self.place.validate()
    }
}
