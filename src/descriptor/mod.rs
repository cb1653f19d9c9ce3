//! Scan Context descriptors for place recognition.
//!
//! A Scan Context is a polar height map of one lidar scan:
//!
//! ```text
//!            sector 0 (+X)      sector S-1
//!   ring 0   [ max z ][ max z ] ... [ max z ]   ← closest to sensor
//!   ring 1   [ max z ][ max z ] ... [ max z ]
//!    ...
//!   ring R-1 [ max z ][ max z ] ... [ max z ]   ← max_radius
//! ```
//!
//! Yaw rotation of the sensor only permutes columns, so every row statistic
//! (the [`RingKey`]) is rotation invariant and serves as a coarse retrieval
//! key. Column statistics form the sector key used for fast yaw alignment.

mod config;
mod scan_context;

pub use config::DescriptorConfig;
pub use scan_context::{DescriptorBuilder, RingKey, ScanContext};
