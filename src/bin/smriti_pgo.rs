//! Pose graph optimization from an odometry trajectory and detected closures.
//!
//! # Usage
//!
//! ```bash
//! smriti-pgo --poses poses_kitti.txt --closures closures.txt --output results/
//! ```
//!
//! # Output Files
//!
//! - `out.g2o`: the assembled pose graph (optimized poses when solving succeeds)
//! - `optimized_poses_kitti.txt`: trajectory relative to the first pose

use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info, warn};

use smriti::io::{read_closures, read_poses, write_poses};
use smriti::pipeline::{anchor_to_first, build_pose_graph, optimized_trajectory};
use smriti::{Error, SmritiConfig};

#[derive(Parser)]
#[command(name = "smriti-pgo")]
#[command(about = "Optimize a lidar trajectory with Scan Context loop closures")]
struct Args {
    /// Odometry trajectory in KITTI format
    #[arg(short, long)]
    poses: PathBuf,

    /// Closure records (candidate query + 16 transform entries per line)
    #[arg(short, long)]
    closures: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// YAML configuration (defaults to configs/config.yaml when present)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Error> {
    let config = match &args.config {
        Some(path) => SmritiConfig::load(path)?,
        None => SmritiConfig::load_default()?,
    };

    let odometry = read_poses(&args.poses)?;
    let closures = read_closures(&args.closures)?;
    info!(
        "[PGO] {} poses from {}, {} closures from {}",
        odometry.len(),
        args.poses.display(),
        closures.len(),
        args.closures.display()
    );

    let (mut graph, report) = build_pose_graph(
        &odometry,
        &closures,
        None,
        config.pose_graph.clone(),
        &config.pipeline,
    )?;
    if !report.rejected.is_empty() {
        warn!("[PGO] {} closures skipped", report.rejected.len());
    }

    std::fs::create_dir_all(&args.output)?;

    let trajectory = match graph.optimize() {
        Ok(summary) => {
            info!(
                "[PGO] {:?} after {} iterations, error {:.6e} -> {:.6e}",
                summary.termination, summary.iterations, summary.initial_error, summary.final_error
            );
            optimized_trajectory(&graph)?
        }
        Err(e) if e.is_recoverable() => {
            warn!("[PGO] {}; writing the initial trajectory", e);
            odometry.clone()
        }
        Err(e) => return Err(e),
    };

    write_outputs(&args.output, &graph, &anchor_to_first(&trajectory))
}

fn write_outputs(
    dir: &Path,
    graph: &smriti::PoseGraph,
    trajectory: &[smriti::Pose3D],
) -> Result<(), Error> {
    let g2o_path = dir.join("out.g2o");
    graph.write_graph(&g2o_path)?;

    let poses_path = dir.join("optimized_poses_kitti.txt");
    write_poses(&poses_path, trajectory)?;

    info!(
        "[PGO] wrote {} and {}",
        g2o_path.display(),
        poses_path.display()
    );
    Ok(())
}
