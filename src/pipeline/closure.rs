//! Closure detection over a whole sequence.

use log::{debug, info};
use nalgebra::Matrix4;

use crate::core::Pose3D;
use crate::core::pose::from_yaw;
use crate::error::Result;
use crate::evaluation::{PrecisionRecallCurve, ScoredCandidate};
use crate::place::ScanContextManager;

use super::config::PipelineConfig;
use super::traits::PointCloudSource;

/// A detected closure: `candidate` seen from `query` through `relative`.
///
/// `relative` is the pose of the candidate frame in the query frame
/// (`T_query⁻¹ · T_candidate`). From place recognition alone this is the
/// pure yaw rotation `Rz(yaw)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClosureRecord {
    /// Earlier scan id.
    pub candidate_id: usize,
    /// Later scan id.
    pub query_id: usize,
    /// Candidate pose in the query frame.
    pub relative: Pose3D,
}

impl ClosureRecord {
    /// Build a closure from a coarse yaw estimate.
    pub fn from_yaw(candidate_id: usize, query_id: usize, yaw: f64) -> Self {
        Self {
            candidate_id,
            query_id,
            relative: from_yaw(yaw),
        }
    }

    /// Relative transform as a homogeneous matrix.
    pub fn relative_matrix(&self) -> Matrix4<f64> {
        self.relative.to_homogeneous()
    }
}

/// Everything a run produced.
#[derive(Clone, Debug, Default)]
pub struct PipelineOutput {
    /// Candidates below the closure threshold.
    pub closures: Vec<ClosureRecord>,
    /// Every candidate returned by the matcher.
    pub scored: Vec<ScoredCandidate>,
    /// Precision/recall, when the source has ground truth.
    pub metrics: Option<PrecisionRecallCurve>,
}

/// Streams a sequence through a [`ScanContextManager`].
pub struct ClosurePipeline {
    manager: ScanContextManager,
    config: PipelineConfig,
}

impl ClosurePipeline {
    /// Create a pipeline around a configured manager.
    pub fn new(manager: ScanContextManager, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { manager, config })
    }

    /// Underlying manager.
    pub fn manager(&self) -> &ScanContextManager {
        &self.manager
    }

    /// Process every scan of `source` in order, querying after each insert.
    pub fn run(&mut self, source: &dyn PointCloudSource) -> Result<PipelineOutput> {
        let mut output = PipelineOutput::default();

        for index in 0..source.len() {
            let scan = source.scan(index)?;
            self.manager.process_new_scan(&scan);

            let query = self.manager.check_for_closure();
            let Some(query_id) = query.query_id else {
                continue;
            };
            for candidate in &query.candidates {
                if candidate.distance < self.config.closure_threshold {
                    debug!(
                        "[Pipeline] closure {} -> {} (distance {:.3}, yaw {:.1}°)",
                        query_id,
                        candidate.scan_id,
                        candidate.distance,
                        candidate.yaw.to_degrees()
                    );
                    output.closures.push(ClosureRecord::from_yaw(
                        candidate.scan_id,
                        query_id,
                        candidate.yaw,
                    ));
                }
                output.scored.push(ScoredCandidate {
                    query_id,
                    candidate_id: candidate.scan_id,
                    distance: candidate.distance,
                });
            }
        }

        if let Some(truth) = source.ground_truth_closures() {
            output.metrics = Some(PrecisionRecallCurve::compute(
                &output.scored,
                truth,
                &self.config.evaluation_thresholds,
            ));
        }

        info!(
            "[Pipeline] {} scans, {} scored candidates, {} closures",
            source.len(),
            output.scored.len(),
            output.closures.len()
        );
        Ok(output)
    }
}
