//! Unified configuration loading for Smriti.
//!
//! Loads all configuration from a single YAML file with sensible defaults.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smriti::config::SmritiConfig;
//!
//! // Load from default path (configs/config.yaml), falling back to defaults
//! let config = SmritiConfig::load_default()?;
//!
//! let manager = ScanContextManager::new(config.scan_context_config())?;
//! let graph = PoseGraph::new(config.pose_graph.clone());
//! ```
//!
//! ## Configuration Sections
//!
//! | Section | Description |
//! |---------|-------------|
//! | `descriptor` | Rings, sectors, max radius, sensor height |
//! | `place` | Exclusion window, candidate count, retrieval backend |
//! | `pose_graph` | Iteration budget, tolerances, damping, robust kernel |
//! | `pipeline` | Closure threshold, edge information, verifier fitness |
//!
//! ## Example YAML
//!
//! ```yaml
//! descriptor:
//!   num_rings: 20
//!   num_sectors: 60
//!   max_radius: 80.0
//!   sensor_height: 2.0
//! place:
//!   exclusion_window: 50
//!   num_candidates: 10
//!   retrieval: kd_tree
//! pose_graph:
//!   max_iterations: 100
//!   robust_kernel: none
//! pipeline:
//!   closure_threshold: 0.4
//! ```

mod error;
mod smriti;

pub use error::ConfigLoadError;
pub use smriti::SmritiConfig;
