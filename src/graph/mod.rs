//! SE(3) pose graph optimization.
//!
//! Nodes are poses, factors are relative-pose measurements weighted by a
//! 6×6 information matrix. Odometry and loop closures are both plain
//! factors. [`PoseGraph::optimize`] runs Levenberg-Marquardt with one or
//! more anchored nodes removed from the unknowns.
//!
//! ```text
//!   add_variable / add_factor ──► accumulation ──optimize()──► solved
//!             ▲                                                 │
//!             └──────────────── add_* invalidates ──────────────┘
//! ```

mod config;
pub mod g2o;
pub mod linear;
mod optimizer;
mod pose_graph;
mod robust;

pub use config::{LinearSolverKind, PoseGraphConfig};
pub use optimizer::{OptimizationSummary, TerminationReason, residual};
pub use pose_graph::{Information6, PoseFactor, PoseGraph, PoseNode};
pub use robust::RobustKernel;
