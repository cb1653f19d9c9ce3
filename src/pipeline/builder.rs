//! Pose graph assembly from odometry and detected closures.

use log::{debug, info, warn};
use nalgebra::Matrix6;

use crate::core::Pose3D;
use crate::error::{Error, Result};
use crate::graph::{PoseGraph, PoseGraphConfig};

use super::closure::ClosureRecord;
use super::config::PipelineConfig;
use super::traits::{GeometricVerifier, PointCloudSource};

/// Why a closure did not become a factor.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectionReason {
    /// Verifier fitness at or below `min_fitness`.
    LowFitness(f64),
    /// Verifier returned an error.
    VerifierFailed,
    /// Closure references a scan outside the trajectory.
    OutOfRange,
}

/// Counts from [`build_pose_graph`].
#[derive(Clone, Debug, Default)]
pub struct BuildReport {
    /// Odometry factors added.
    pub odometry_factors: usize,
    /// Closure factors added.
    pub accepted: usize,
    /// Closures skipped, with the reason.
    pub rejected: Vec<(ClosureRecord, RejectionReason)>,
}

/// Verifier plus the scans it aligns.
pub struct Verification<'a> {
    /// Registration back end.
    pub verifier: &'a dyn GeometricVerifier,
    /// Scans indexed like the trajectory.
    pub source: &'a dyn PointCloudSource,
}

/// Build the pose graph of a trajectory.
///
/// Node `k` is `odometry[k]`; consecutive nodes are linked by
/// `T_k⁻¹ · T_{k+1}` with the odometry information. Each closure becomes a
/// factor from the query node to the candidate node with the closure
/// information. With a verifier, the candidate scan is aligned onto the
/// query scan starting from the closure transform, and only alignments with
/// fitness above `min_fitness` are kept, using the refined transform.
pub fn build_pose_graph(
    odometry: &[Pose3D],
    closures: &[ClosureRecord],
    verification: Option<&Verification<'_>>,
    graph_config: PoseGraphConfig,
    config: &PipelineConfig,
) -> Result<(PoseGraph, BuildReport)> {
    config.validate()?;
    let mut graph = PoseGraph::new(graph_config);
    let odometry_information = Matrix6::identity() * config.odometry_information;
    let closure_information = Matrix6::identity() * config.closure_information;

    graph.add_odometry_chain(0, odometry, odometry_information)?;
    let mut report = BuildReport {
        odometry_factors: odometry.len().saturating_sub(1),
        ..Default::default()
    };

    for closure in closures {
        if closure.query_id >= odometry.len() || closure.candidate_id >= odometry.len() {
            warn!(
                "[Builder] closure {} -> {} outside trajectory of {} poses",
                closure.query_id,
                closure.candidate_id,
                odometry.len()
            );
            report.rejected.push((*closure, RejectionReason::OutOfRange));
            continue;
        }

        let measurement = match verification {
            None => closure.relative,
            Some(v) => match verify(v, closure) {
                Ok(registration) if registration.fitness > config.min_fitness => {
                    registration.transform
                }
                Ok(registration) => {
                    debug!(
                        "[Builder] closure {} -> {} rejected: fitness {:.3}",
                        closure.query_id, closure.candidate_id, registration.fitness
                    );
                    report
                        .rejected
                        .push((*closure, RejectionReason::LowFitness(registration.fitness)));
                    continue;
                }
                Err(e) => {
                    warn!(
                        "[Builder] closure {} -> {} verification failed: {}",
                        closure.query_id, closure.candidate_id, e
                    );
                    report.rejected.push((*closure, RejectionReason::VerifierFailed));
                    continue;
                }
            },
        };

        graph.add_factor(
            closure.query_id as u64,
            closure.candidate_id as u64,
            measurement,
            closure_information,
        )?;
        report.accepted += 1;
    }

    info!(
        "[Builder] {} poses, {} odometry factors, {} closures accepted, {} rejected",
        odometry.len(),
        report.odometry_factors,
        report.accepted,
        report.rejected.len()
    );
    Ok((graph, report))
}

fn verify(
    v: &Verification<'_>,
    closure: &ClosureRecord,
) -> Result<super::traits::Registration> {
    let source = v.source.scan(closure.candidate_id)?;
    let target = v.source.scan(closure.query_id)?;
    v.verifier.verify(&source, &target, &closure.relative)
}

/// Express every pose relative to the first one.
pub fn anchor_to_first(poses: &[Pose3D]) -> Vec<Pose3D> {
    let Some(first) = poses.first() else {
        return Vec::new();
    };
    let inv = first.inverse();
    poses.iter().map(|p| inv * p).collect()
}

/// Optimized trajectory ordered by node id `0..n`.
pub fn optimized_trajectory(graph: &PoseGraph) -> Result<Vec<Pose3D>> {
    let estimates = graph.estimates()?;
    (0..estimates.len() as u64)
        .map(|id| estimates.get(&id).copied().ok_or(Error::UnknownNode(id)))
        .collect()
}
