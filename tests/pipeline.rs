//! Closure pipeline and graph assembly integration tests.

mod common;

use std::cell::Cell;
use std::f64::consts::{PI, TAU};

use approx::assert_relative_eq;
use smriti::io::{read_closures, read_poses, write_closures, write_poses};
use smriti::pipeline::{
    InMemorySource, RejectionReason, Verification, anchor_to_first, optimized_trajectory,
};
use smriti::place::{PlaceConfig, ScanContextConfig};
use smriti::{
    ClosurePipeline, ClosureRecord, Error, GeometricVerifier, PipelineConfig, Point3D, Pose3D,
    PoseGraphConfig, Registration, ScanContextManager, build_pose_graph,
};

fn u_turn_pipeline() -> ClosurePipeline {
    let config = ScanContextConfig {
        place: PlaceConfig {
            exclusion_window: 5,
            ..Default::default()
        },
        ..Default::default()
    };
    let manager = ScanContextManager::new(config).unwrap();
    ClosurePipeline::new(manager, PipelineConfig::default()).unwrap()
}

fn u_turn_trajectory() -> Vec<Pose3D> {
    common::u_turn_poses()
        .into_iter()
        .map(|(x, y, heading)| common::planar_pose(x, y, heading))
        .collect()
}

/// Scan `i` holds `i + 1` points so the verifier can tell scans apart.
fn numbered_source(n: usize) -> InMemorySource {
    InMemorySource::new(
        (0..n)
            .map(|i| vec![Point3D::new(1.0, 0.0, 0.0); i + 1])
            .collect(),
    )
}

/// Encodes which scans it saw in the refined translation.
struct RecordingVerifier {
    fitness: f64,
    calls: Cell<usize>,
}

impl GeometricVerifier for RecordingVerifier {
    fn verify(
        &self,
        source: &[Point3D],
        target: &[Point3D],
        initial: &Pose3D,
    ) -> smriti::Result<Registration> {
        self.calls.set(self.calls.get() + 1);
        let refined = common::planar_pose(source.len() as f64, target.len() as f64, 0.0) * initial;
        Ok(Registration {
            transform: refined,
            fitness: self.fitness,
        })
    }
}

struct FailingVerifier;

impl GeometricVerifier for FailingVerifier {
    fn verify(&self, _: &[Point3D], _: &[Point3D], _: &Pose3D) -> smriti::Result<Registration> {
        Err(Error::InvalidInput("too few correspondences".into()))
    }
}

// ============================================================================
// Closure detection
// ============================================================================

#[test]
fn test_pipeline_finds_u_turn_closure() {
    common::init_logging();
    let source = InMemorySource::new(common::u_turn_scans()).with_ground_truth(vec![(0, 12)]);
    let mut pipeline = u_turn_pipeline();

    let output = pipeline.run(&source).unwrap();
    assert_eq!(pipeline.manager().len(), 13);

    let closure = output
        .closures
        .iter()
        .find(|c| c.query_id == 12 && c.candidate_id == 0)
        .expect("revisit closure");
    let yaw = closure.relative.rotation.angle();
    assert!((yaw - PI).abs() <= TAU / 60.0, "yaw {}", yaw.to_degrees());

    // Nothing inside the exclusion window is ever scored
    for c in &output.closures {
        assert!(c.candidate_id + 5 <= c.query_id);
    }
    for s in &output.scored {
        assert!(s.candidate_id + 5 <= s.query_id);
    }

    let metrics = output.metrics.unwrap();
    assert_eq!(metrics.points().len(), 18);
    assert_relative_eq!(metrics.points().last().unwrap().recall, 1.0);
    assert!(metrics.best_f1().unwrap().f1_score > 0.0);
}

#[test]
fn test_pipeline_without_ground_truth_has_no_metrics() {
    let source = InMemorySource::new(common::u_turn_scans());
    let output = u_turn_pipeline().run(&source).unwrap();
    assert!(output.metrics.is_none());
    assert!(!output.scored.is_empty());
}

#[test]
fn test_pipeline_rejects_invalid_policy() {
    let manager = ScanContextManager::new(ScanContextConfig::default()).unwrap();
    let config = PipelineConfig {
        closure_information: -1.0,
        ..Default::default()
    };
    assert!(matches!(
        ClosurePipeline::new(manager, config),
        Err(Error::InvalidConfig(_))
    ));
}

// ============================================================================
// Graph assembly
// ============================================================================

#[test]
fn test_build_without_verifier_uses_coarse_yaw() {
    let trajectory = common::straight_trajectory(8, 1.0);
    let closures = [ClosureRecord::from_yaw(0, 7, PI)];

    let (graph, report) = build_pose_graph(
        &trajectory,
        &closures,
        None,
        PoseGraphConfig::default(),
        &PipelineConfig::default(),
    )
    .unwrap();

    assert_eq!(graph.num_nodes(), 8);
    assert_eq!(graph.num_factors(), 8);
    assert_eq!(report.odometry_factors, 7);
    assert_eq!(report.accepted, 1);
    assert!(report.rejected.is_empty());

    let factor = &graph.factors()[7];
    assert_eq!((factor.from, factor.to), (7, 0));
    assert_relative_eq!(factor.measurement.rotation.angle(), PI, epsilon = 1e-12);
    assert_relative_eq!(factor.information[(0, 0)], 1000.0);
    assert_relative_eq!(graph.factors()[0].information[(0, 0)], 1.0);
}

#[test]
fn test_verified_closure_uses_refined_transform() {
    let trajectory = common::straight_trajectory(6, 1.0);
    let source = numbered_source(6);
    let verifier = RecordingVerifier {
        fitness: 0.9,
        calls: Cell::new(0),
    };
    let verification = Verification {
        verifier: &verifier,
        source: &source,
    };
    let closures = [ClosureRecord::from_yaw(1, 5, 0.0)];

    let (graph, report) = build_pose_graph(
        &trajectory,
        &closures,
        Some(&verification),
        PoseGraphConfig::default(),
        &PipelineConfig::default(),
    )
    .unwrap();

    assert_eq!(verifier.calls.get(), 1);
    assert_eq!(report.accepted, 1);
    // Candidate scan is the source, query scan the target
    let measurement = graph.factors()[5].measurement;
    assert_relative_eq!(measurement.translation.x, 2.0, epsilon = 1e-12);
    assert_relative_eq!(measurement.translation.y, 6.0, epsilon = 1e-12);
}

#[test]
fn test_low_fitness_and_failures_are_rejected() {
    let trajectory = common::straight_trajectory(6, 1.0);
    let source = numbered_source(6);
    let closures = [
        ClosureRecord::from_yaw(0, 5, 0.0),
        ClosureRecord::from_yaw(0, 40, 0.0),
    ];

    let weak = RecordingVerifier {
        fitness: 0.5,
        calls: Cell::new(0),
    };
    let (graph, report) = build_pose_graph(
        &trajectory,
        &closures,
        Some(&Verification {
            verifier: &weak,
            source: &source,
        }),
        PoseGraphConfig::default(),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(graph.num_factors(), 5);
    assert_eq!(report.accepted, 0);
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.rejected[0].1, RejectionReason::LowFitness(0.5));
    assert_eq!(report.rejected[1].1, RejectionReason::OutOfRange);
    assert_eq!(weak.calls.get(), 1);

    let (_, report) = build_pose_graph(
        &trajectory,
        &closures[..1],
        Some(&Verification {
            verifier: &FailingVerifier,
            source: &source,
        }),
        PoseGraphConfig::default(),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(report.rejected[0].1, RejectionReason::VerifierFailed);
}

#[test]
fn test_detect_then_optimize() {
    let source = InMemorySource::new(common::u_turn_scans());
    let output = u_turn_pipeline().run(&source).unwrap();
    let trajectory = common::with_heading_drift(&u_turn_trajectory(), 0.002);

    let revisit: Vec<ClosureRecord> = output
        .closures
        .iter()
        .filter(|c| c.query_id == 12 && c.candidate_id == 0)
        .copied()
        .collect();

    let (mut graph, report) = build_pose_graph(
        &trajectory,
        &revisit,
        None,
        PoseGraphConfig::default(),
        &PipelineConfig::default(),
    )
    .unwrap();
    assert_eq!(report.accepted, 1);

    let summary = graph.optimize().unwrap();
    assert!(summary.final_error <= summary.initial_error);

    let optimized = optimized_trajectory(&graph).unwrap();
    assert_eq!(optimized.len(), 13);
    assert_eq!(optimized[0], trajectory[0]);
}

// ============================================================================
// Trajectory export
// ============================================================================

#[test]
fn test_anchor_to_first() {
    let offset = common::planar_pose(3.0, -1.0, 0.7);
    let trajectory: Vec<Pose3D> = common::straight_trajectory(4, 1.0)
        .into_iter()
        .map(|p| offset * p)
        .collect();

    let anchored = anchor_to_first(&trajectory);
    assert_eq!(anchored.len(), 4);
    assert_relative_eq!(anchored[0].translation.vector.norm(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(anchored[0].rotation.angle(), 0.0, epsilon = 1e-12);
    assert_relative_eq!(anchored[3].translation.x, 3.0, epsilon = 1e-12);
    assert_relative_eq!(anchored[3].translation.y, 0.0, epsilon = 1e-12);
    assert!(anchor_to_first(&[]).is_empty());
}

#[test]
fn test_closure_and_pose_files() {
    let dir = tempfile::tempdir().unwrap();
    let closures = vec![
        ClosureRecord::from_yaw(0, 12, PI),
        ClosureRecord::from_yaw(3, 40, 0.25),
    ];
    let trajectory = u_turn_trajectory();

    let closures_path = dir.path().join("closures.txt");
    let poses_path = dir.path().join("poses_kitti.txt");
    write_closures(&closures_path, &closures).unwrap();
    write_poses(&poses_path, &trajectory).unwrap();

    let loaded = read_closures(&closures_path).unwrap();
    assert_eq!(loaded.len(), 2);
    for (a, b) in closures.iter().zip(&loaded) {
        assert_eq!((a.candidate_id, a.query_id), (b.candidate_id, b.query_id));
        assert_relative_eq!(a.relative_matrix(), b.relative_matrix(), epsilon = 1e-9);
    }

    let poses = read_poses(&poses_path).unwrap();
    assert_eq!(poses.len(), trajectory.len());
    for (a, b) in trajectory.iter().zip(&poses) {
        assert_relative_eq!(a.to_homogeneous(), b.to_homogeneous(), epsilon = 1e-9);
    }
}
