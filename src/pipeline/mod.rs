//! End-to-end closure pipeline.
//!
//! ```text
//! PointCloudSource ──► ClosurePipeline ──► ClosureRecord list ─┐
//!                      (ScanContextManager)                    │
//! odometry poses ─────────────────────────► build_pose_graph ◄─┘
//!                                           (GeometricVerifier)
//!                                                  │
//!                                           PoseGraph::optimize
//! ```

mod builder;
mod closure;
mod config;
mod traits;

pub use builder::{
    BuildReport, RejectionReason, Verification, anchor_to_first, build_pose_graph,
    optimized_trajectory,
};
pub use closure::{ClosurePipeline, ClosureRecord, PipelineOutput};
pub use config::PipelineConfig;
pub use traits::{GeometricVerifier, InMemorySource, PointCloudSource, Registration};
