//! Main SmritiConfig and conversion methods.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::descriptor::DescriptorConfig;
use crate::graph::PoseGraphConfig;
use crate::pipeline::PipelineConfig;
use crate::place::{PlaceConfig, ScanContextConfig};

use super::error::ConfigLoadError;

/// Default configuration path, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

/// Full Smriti configuration loaded from YAML
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct SmritiConfig {
    /// Descriptor geometry
    #[serde(default)]
    pub descriptor: DescriptorConfig,

    /// Place index and matcher settings
    #[serde(default)]
    pub place: PlaceConfig,

    /// Pose graph optimizer settings
    #[serde(default)]
    pub pose_graph: PoseGraphConfig,

    /// Closure pipeline policy
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl SmritiConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io(e.to_string()))?;
        Self::from_yaml(&contents)
    }

    /// Load from default config path (configs/config.yaml)
    pub fn load_default() -> Result<Self, ConfigLoadError> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigLoadError> {
        serde_yaml::to_string(self).map_err(|e| ConfigLoadError::Parse(e.to_string()))
    }

    /// Combined descriptor + place config for [`crate::ScanContextManager`]
    pub fn scan_context_config(&self) -> ScanContextConfig {
        ScanContextConfig {
            descriptor: self.descriptor.clone(),
            place: self.place.clone(),
        }
    }
}
