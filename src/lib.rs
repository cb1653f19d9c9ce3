//! # Smriti
//!
//! Lidar place recognition and SE(3) pose graph optimization for loop closure.
//!
//! ## Overview
//!
//! Smriti detects when a robot revisits a place and uses those revisits to
//! correct odometry drift:
//!
//! - **Descriptor**: Scan Context polar height grid plus a yaw-invariant ring key
//! - **Place recognition**: coarse ring-key retrieval followed by exhaustive
//!   column-shift matching that also estimates the relative yaw
//! - **Pose graph**: Levenberg-Marquardt over SE(3) nodes and relative-pose factors
//! - **Pipeline**: closure detection over a scan source, optional geometric
//!   verification, trajectory export
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use smriti::{ScanContextConfig, ScanContextManager};
//!
//! let mut manager = ScanContextManager::new(ScanContextConfig::default())?;
//! for cloud in clouds {
//!     manager.process_new_scan(&cloud);
//!     let query = manager.check_for_closure();
//!     if let Some(best) = query.best() {
//!         println!("scan {} ~ {} ({:.3})", query.query_index(), best.scan_id, best.distance);
//!     }
//! }
//! ```
//!
//! ## Coordinate System
//!
//! - X forward, Y left, Z up (sensor frame)
//! - Sector 0 of a descriptor starts at the +X axis and sectors grow
//!   counter-clockwise
//! - Yaw in radians, CCW positive

#![warn(missing_docs)]

// Core types
pub mod core;

// Error taxonomy
pub mod error;

// Unified configuration
pub mod config;

// Scan Context descriptors
pub mod descriptor;

// Place index, retrieval and shift matching
pub mod place;

// SE(3) pose graph optimization
pub mod graph;

// Closure detection and graph assembly
pub mod pipeline;

// Trajectory and closure files
pub mod io;

// Precision / recall against ground truth
pub mod evaluation;

pub use core::{Point3D, PointCloud, Pose3D, Twist};

pub use error::{Error, Result};

pub use config::{ConfigLoadError, SmritiConfig};

pub use descriptor::{DescriptorBuilder, DescriptorConfig, RingKey, ScanContext};

pub use place::{
    CandidateMatch, ClosureQuery, PlaceConfig, PlaceIndex, RetrievalBackend, ScanContextConfig,
    ScanContextManager, ShiftMatcher,
};

pub use graph::{
    Information6, OptimizationSummary, PoseFactor, PoseGraph, PoseGraphConfig, PoseNode,
    RobustKernel, TerminationReason,
};

pub use pipeline::{
    ClosurePipeline, ClosureRecord, GeometricVerifier, PipelineConfig, PointCloudSource,
    Registration, build_pose_graph,
};

pub use evaluation::{PrecisionRecall, PrecisionRecallCurve};
