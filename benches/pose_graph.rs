//! Benchmark pose graph optimization with dense and iterative solvers.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::{Isometry3, Matrix6, Translation3, UnitQuaternion, Vector3};
use std::hint::black_box;
use smriti::graph::LinearSolverKind;
use smriti::{Pose3D, PoseGraph, PoseGraphConfig};

fn planar(x: f64, y: f64, heading: f64) -> Pose3D {
    Isometry3::from_parts(
        Translation3::new(x, y, 0.0),
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), heading),
    )
}

/// Circle of `n` poses with heading drift and one closure back to the start.
fn drifted_loop(n: usize, config: PoseGraphConfig) -> PoseGraph {
    let step = planar(1.0, 0.0, std::f64::consts::TAU / n as f64 + 0.002);
    let mut poses = vec![Pose3D::identity()];
    for _ in 1..n {
        let last = poses[poses.len() - 1];
        poses.push(last * step);
    }

    let mut graph = PoseGraph::new(config);
    graph
        .add_odometry_chain(0, &poses, Matrix6::identity())
        .unwrap();
    let closure = planar(1.0, 0.0, std::f64::consts::TAU / n as f64);
    graph
        .add_factor(n as u64 - 1, 0, closure, Matrix6::identity() * 1000.0)
        .unwrap();
    graph
}

fn bench_optimize(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_graph_optimize");
    group.sample_size(10);

    for n in [50, 200, 500].iter() {
        for solver in [LinearSolverKind::Dense, LinearSolverKind::Pcg] {
            let config = PoseGraphConfig {
                linear_solver: solver,
                ..Default::default()
            };
            let graph = drifted_loop(*n, config);
            group.bench_with_input(BenchmarkId::new(format!("{:?}", solver), n), n, |b, _| {
                b.iter(|| {
                    let mut g = graph.clone();
                    black_box(g.optimize().is_ok())
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_optimize);
criterion_main!(benches);
