//! Pose graph: SE(3) nodes, relative-pose factors and the solve lifecycle.
//!
//! Nodes live in an arena indexed by insertion order; factors refer to nodes
//! by id. Any `add_*` call after a successful [`PoseGraph::optimize`]
//! invalidates the solution until the next successful solve.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;

use log::{debug, info, warn};
use nalgebra::{Matrix4, Matrix6, SymmetricEigen};

use crate::core::Pose3D;
use crate::core::pose::{from_matrix, to_matrix};
use crate::error::{Error, Result};

use super::config::PoseGraphConfig;
use super::optimizer::{LevenbergMarquardt, OptimizationSummary, ResolvedFactor, residual};

/// Relative tolerance for the symmetry and PSD checks of information matrices.
const INFORMATION_TOLERANCE: f64 = 1e-9;

/// 6×6 information matrix, ordered `(ρ, φ)`.
pub type Information6 = Matrix6<f64>;

/// A pose variable.
#[derive(Debug, Clone)]
pub struct PoseNode {
    /// Caller-assigned id.
    pub id: u64,
    /// Current estimate.
    pub pose: Pose3D,
    /// Held constant during optimization.
    pub fixed: bool,
}

/// Soft constraint `pose(to) ≈ pose(from) · measurement`.
#[derive(Debug, Clone)]
pub struct PoseFactor {
    /// Source node id.
    pub from: u64,
    /// Target node id.
    pub to: u64,
    /// Measured relative transform.
    pub measurement: Pose3D,
    /// Inverse covariance (symmetric PSD).
    pub information: Information6,
}

/// Nonlinear least-squares pose graph.
///
/// # Example
///
/// ```
/// use nalgebra::{Isometry3, Matrix6};
/// use smriti::graph::{PoseGraph, PoseGraphConfig};
///
/// let mut graph = PoseGraph::new(PoseGraphConfig::default());
/// let step = Isometry3::translation(1.0, 0.0, 0.0);
/// graph.add_variable(0, Isometry3::identity()).unwrap();
/// graph.add_variable(1, Isometry3::translation(1.2, 0.1, 0.0)).unwrap();
/// graph.add_factor(0, 1, step, Matrix6::identity()).unwrap();
///
/// graph.optimize().unwrap();
/// let estimates = graph.estimates().unwrap();
/// assert!((estimates[&1].translation.x - 1.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct PoseGraph {
    config: PoseGraphConfig,
    nodes: Vec<PoseNode>,
    index: HashMap<u64, usize>,
    factors: Vec<PoseFactor>,
    solved: bool,
    last_summary: Option<OptimizationSummary>,
}

impl PoseGraph {
    /// Create an empty graph.
    pub fn new(config: PoseGraphConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            index: HashMap::new(),
            factors: Vec::new(),
            solved: false,
            last_summary: None,
        }
    }

    /// Optimizer configuration.
    pub fn config(&self) -> &PoseGraphConfig {
        &self.config
    }

    /// Replace the optimizer configuration, e.g. to retry after
    /// `NonConvergence` with a larger budget.
    ///
    /// Nodes and factors are unchanged, so an existing solution stays valid.
    pub fn set_config(&mut self, config: PoseGraphConfig) -> Result<()> {
        config.validate()?;
        if config.fix_first_node != self.config.fix_first_node {
            debug!("[PoseGraph] fix_first_node only applies to nodes added later");
        }
        self.config = config;
        Ok(())
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Number of factors.
    pub fn num_factors(&self) -> usize {
        self.factors.len()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[PoseNode] {
        &self.nodes
    }

    /// Factors in insertion order.
    pub fn factors(&self) -> &[PoseFactor] {
        &self.factors
    }

    /// Node by id.
    pub fn node(&self, id: u64) -> Option<&PoseNode> {
        self.index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Whether the current estimates come from a successful solve.
    pub fn is_solved(&self) -> bool {
        self.solved
    }

    /// Summary of the last successful solve.
    pub fn last_summary(&self) -> Option<&OptimizationSummary> {
        self.last_summary.as_ref()
    }

    /// Register a node with an initial estimate.
    pub fn add_variable(&mut self, id: u64, initial: Pose3D) -> Result<()> {
        if self.index.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let fixed = self.config.fix_first_node && self.nodes.is_empty();
        self.index.insert(id, self.nodes.len());
        self.nodes.push(PoseNode {
            id,
            pose: initial,
            fixed,
        });
        self.invalidate();
        Ok(())
    }

    /// [`Self::add_variable`] from a homogeneous 4×4 matrix.
    pub fn add_variable_matrix(&mut self, id: u64, initial: &Matrix4<f64>) -> Result<()> {
        let pose = from_matrix(initial)?;
        self.add_variable(id, pose)
    }

    /// Register a relative-pose factor.
    ///
    /// Fails with `UnknownNode` for unregistered ids and with
    /// `InvalidInformation` unless `information` is symmetric positive
    /// semi-definite. Nothing is stored on failure.
    pub fn add_factor(
        &mut self,
        from: u64,
        to: u64,
        measurement: Pose3D,
        information: Information6,
    ) -> Result<()> {
        for id in [from, to] {
            if !self.index.contains_key(&id) {
                return Err(Error::UnknownNode(id));
            }
        }
        if from == to {
            return Err(Error::InvalidInput(format!(
                "factor connects node {} to itself",
                from
            )));
        }
        let information = validate_information(&information)?;
        self.factors.push(PoseFactor {
            from,
            to,
            measurement,
            information,
        });
        self.invalidate();
        Ok(())
    }

    /// [`Self::add_factor`] from a homogeneous 4×4 matrix.
    pub fn add_factor_matrix(
        &mut self,
        from: u64,
        to: u64,
        measurement: &Matrix4<f64>,
        information: Information6,
    ) -> Result<()> {
        let pose = from_matrix(measurement)?;
        self.add_factor(from, to, pose, information)
    }

    /// Hold a registered node fixed.
    pub fn set_fixed(&mut self, id: u64, fixed: bool) -> Result<()> {
        let &i = self.index.get(&id).ok_or(Error::UnknownNode(id))?;
        if self.nodes[i].fixed != fixed {
            self.nodes[i].fixed = fixed;
            self.invalidate();
        }
        Ok(())
    }

    /// Register `poses` as nodes `first_id, first_id + 1, ...` chained by
    /// odometry factors `T_k⁻¹ · T_{k+1}`.
    pub fn add_odometry_chain(
        &mut self,
        first_id: u64,
        poses: &[Pose3D],
        information: Information6,
    ) -> Result<()> {
        let information = validate_information(&information)?;
        for k in 0..poses.len() {
            let id = first_id + k as u64;
            if self.index.contains_key(&id) {
                return Err(Error::DuplicateId(id));
            }
        }
        for (k, pose) in poses.iter().enumerate() {
            self.add_variable(first_id + k as u64, *pose)?;
        }
        for (k, pair) in poses.windows(2).enumerate() {
            let from = first_id + k as u64;
            self.add_factor(from, from + 1, pair[0].inverse() * pair[1], information)?;
        }
        Ok(())
    }

    /// Current robust cost of all factors.
    pub fn total_error(&self) -> f64 {
        let fixed: Vec<bool> = self.nodes.iter().map(|n| n.fixed).collect();
        let poses: Vec<Pose3D> = self.nodes.iter().map(|n| n.pose).collect();
        LevenbergMarquardt::new(&self.config, self.resolved_factors(), &fixed).cost(&poses)
    }

    /// Per-factor residual twists at the current estimates.
    pub fn residuals(&self) -> Vec<nalgebra::Vector6<f64>> {
        self.factors
            .iter()
            .map(|f| {
                let a = &self.nodes[self.index[&f.from]].pose;
                let b = &self.nodes[self.index[&f.to]].pose;
                residual(a, b, &f.measurement)
            })
            .collect()
    }

    /// Run Levenberg-Marquardt.
    ///
    /// Fails with `SingularSystem` when some node has no path to a fixed
    /// node, and with `NonConvergence` when the budget runs out; in both
    /// cases the estimates are left untouched and a previous solution stays
    /// valid. See [`Self::set_config`] for retrying.
    pub fn optimize(&mut self) -> Result<OptimizationSummary> {
        self.config.validate()?;
        self.check_anchored()?;

        let fixed: Vec<bool> = self.nodes.iter().map(|n| n.fixed).collect();
        let mut poses: Vec<Pose3D> = self.nodes.iter().map(|n| n.pose).collect();

        let summary = {
            let solver = LevenbergMarquardt::new(&self.config, self.resolved_factors(), &fixed);
            solver.run(&mut poses)
        };

        if !summary.converged() {
            warn!(
                "[PoseGraph] no convergence ({:?}) after {} iterations: {:.6e} -> {:.6e}",
                summary.termination, summary.iterations, summary.initial_error, summary.final_error
            );
            return Err(Error::NonConvergence {
                iterations: summary.iterations,
                initial_error: summary.initial_error,
                final_error: summary.final_error,
            });
        }

        for (node, pose) in self.nodes.iter_mut().zip(poses) {
            node.pose = pose;
        }
        self.solved = true;
        info!(
            "[PoseGraph] {} nodes, {} factors: error {:.6e} -> {:.6e} in {} iterations",
            self.nodes.len(),
            self.factors.len(),
            summary.initial_error,
            summary.final_error,
            summary.iterations
        );
        self.last_summary = Some(summary.clone());
        Ok(summary)
    }

    /// Optimized poses by id. Fails with `NotSolved` until a successful solve
    /// with no later `add_*` call.
    pub fn estimates(&self) -> Result<BTreeMap<u64, Pose3D>> {
        if !self.solved {
            return Err(Error::NotSolved);
        }
        Ok(self.current_estimates())
    }

    /// [`Self::estimates`] as homogeneous 4×4 matrices.
    pub fn estimate_matrices(&self) -> Result<BTreeMap<u64, Matrix4<f64>>> {
        Ok(self
            .estimates()?
            .into_iter()
            .map(|(id, pose)| (id, to_matrix(&pose)))
            .collect())
    }

    /// Estimates by id regardless of solve state (initial values before the
    /// first solve).
    pub fn current_estimates(&self) -> BTreeMap<u64, Pose3D> {
        self.nodes.iter().map(|n| (n.id, n.pose)).collect()
    }

    /// Write the graph in g2o `SE3:QUAT` format.
    pub fn write_graph(&self, path: &Path) -> Result<()> {
        super::g2o::write_file(self, path)
    }

    /// Read a g2o `SE3:QUAT` file.
    pub fn read_graph(path: &Path, config: PoseGraphConfig) -> Result<Self> {
        super::g2o::read_file(path, config)
    }

    /// Parse g2o `SE3:QUAT` text.
    pub fn from_g2o_str(text: &str, config: PoseGraphConfig) -> Result<Self> {
        super::g2o::parse(text, config)
    }

    fn invalidate(&mut self) {
        if self.solved {
            debug!("[PoseGraph] graph changed, solution invalidated");
        }
        self.solved = false;
    }

    fn resolved_factors(&self) -> Vec<ResolvedFactor<'_>> {
        self.factors
            .iter()
            .map(|factor| ResolvedFactor {
                factor,
                from: self.index[&factor.from],
                to: self.index[&factor.to],
            })
            .collect()
    }

    /// Every node must reach a fixed node through factors.
    fn check_anchored(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let mut adjacency = vec![Vec::new(); self.nodes.len()];
        for f in &self.factors {
            let a = self.index[&f.from];
            let b = self.index[&f.to];
            adjacency[a].push(b);
            adjacency[b].push(a);
        }

        let mut reached = vec![false; self.nodes.len()];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.fixed {
                reached[i] = true;
                queue.push_back(i);
            }
        }
        if queue.is_empty() {
            return Err(Error::SingularSystem);
        }
        while let Some(i) = queue.pop_front() {
            for &j in &adjacency[i] {
                if !reached[j] {
                    reached[j] = true;
                    queue.push_back(j);
                }
            }
        }
        if let Some(i) = reached.iter().position(|r| !r) {
            warn!(
                "[PoseGraph] node {} is not connected to any fixed node",
                self.nodes[i].id
            );
            return Err(Error::SingularSystem);
        }
        Ok(())
    }
}

/// Symmetrize and check an information matrix.
fn validate_information(information: &Information6) -> Result<Information6> {
    if information.iter().any(|v| !v.is_finite()) {
        return Err(Error::InvalidInformation("non-finite entries".into()));
    }
    let scale = information.amax().max(1.0);
    let asymmetry = (information - information.transpose()).amax();
    if asymmetry > INFORMATION_TOLERANCE * scale {
        return Err(Error::InvalidInformation(format!(
            "not symmetric (max asymmetry {:.3e})",
            asymmetry
        )));
    }
    let symmetric = (information + information.transpose()) * 0.5;
    let min_eigen = SymmetricEigen::new(symmetric)
        .eigenvalues
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    if min_eigen < -INFORMATION_TOLERANCE * scale {
        return Err(Error::InvalidInformation(format!(
            "not positive semi-definite (min eigenvalue {:.3e})",
            min_eigen
        )));
    }
    Ok(symmetric)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::pose::{exp, from_yaw};
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Vector6};

    fn chain(n: usize, step: &Pose3D) -> Vec<Pose3D> {
        let mut poses = vec![Pose3D::identity()];
        for k in 1..n {
            poses.push(poses[k - 1] * step);
        }
        poses
    }

    #[test]
    fn test_duplicate_id() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        graph.add_variable(3, Pose3D::identity()).unwrap();
        assert!(matches!(
            graph.add_variable(3, Pose3D::identity()),
            Err(Error::DuplicateId(3))
        ));
        assert_eq!(graph.num_nodes(), 1);
    }

    #[test]
    fn test_unknown_node_leaves_state() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        graph.add_variable(0, Pose3D::identity()).unwrap();
        graph.add_variable(1, Pose3D::identity()).unwrap();
        graph
            .add_factor(0, 1, Pose3D::identity(), Matrix6::identity())
            .unwrap();

        let err = graph.add_factor(0, 9, Pose3D::identity(), Matrix6::identity());
        assert!(matches!(err, Err(Error::UnknownNode(9))));
        assert_eq!(graph.num_factors(), 1);
        assert_eq!(graph.num_nodes(), 2);
    }

    #[test]
    fn test_information_validation() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        graph.add_variable(0, Pose3D::identity()).unwrap();
        graph.add_variable(1, Pose3D::identity()).unwrap();

        let mut asym = Matrix6::identity();
        asym[(0, 1)] = 0.5;
        assert!(matches!(
            graph.add_factor(0, 1, Pose3D::identity(), asym),
            Err(Error::InvalidInformation(_))
        ));

        let negative = -Matrix6::<f64>::identity();
        assert!(graph.add_factor(0, 1, Pose3D::identity(), negative).is_err());

        // Semi-definite is allowed
        let mut psd = Matrix6::zeros();
        psd[(5, 5)] = 1.0;
        assert!(graph.add_factor(0, 1, Pose3D::identity(), psd).is_ok());
    }

    #[test]
    fn test_no_anchor_is_singular() {
        let config = PoseGraphConfig {
            fix_first_node: false,
            ..Default::default()
        };
        let mut graph = PoseGraph::new(config);
        let poses = chain(3, &Isometry3::translation(1.0, 0.0, 0.0));
        graph.add_odometry_chain(0, &poses, Matrix6::identity()).unwrap();
        assert!(matches!(graph.optimize(), Err(Error::SingularSystem)));

        graph.set_fixed(2, true).unwrap();
        assert!(graph.optimize().is_ok());
        assert!(matches!(graph.set_fixed(7, true), Err(Error::UnknownNode(7))));
    }

    #[test]
    fn test_disconnected_node_is_singular() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        graph.add_variable(0, Pose3D::identity()).unwrap();
        graph.add_variable(1, Pose3D::identity()).unwrap();
        assert!(matches!(graph.optimize(), Err(Error::SingularSystem)));
    }

    #[test]
    fn test_estimates_lifecycle() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        let poses = chain(4, &Isometry3::translation(1.0, 0.0, 0.0));
        graph.add_odometry_chain(0, &poses, Matrix6::identity()).unwrap();
        assert!(matches!(graph.estimates(), Err(Error::NotSolved)));

        graph.optimize().unwrap();
        assert_eq!(graph.estimates().unwrap().len(), 4);

        graph.add_variable(10, Pose3D::identity()).unwrap();
        assert!(matches!(graph.estimates(), Err(Error::NotSolved)));
    }

    #[test]
    fn test_loop_closure_corrects_drift() {
        // Square loop with drifted initial guesses
        let step = Isometry3::translation(2.0, 0.0, 0.0) * from_yaw(std::f64::consts::FRAC_PI_2);
        let truth = chain(5, &step);
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        for (k, pose) in truth.iter().enumerate() {
            let k_f = k as f64;
            let noise = exp(&Vector6::new(0.1 * k_f, -0.05 * k_f, 0.0, 0.0, 0.0, 0.03 * k_f));
            graph.add_variable(k as u64, pose * noise).unwrap();
        }
        for k in 0..4u64 {
            graph.add_factor(k, k + 1, step, Matrix6::identity()).unwrap();
        }
        // Node 4 coincides with node 0
        graph
            .add_factor(4, 0, Pose3D::identity(), Matrix6::identity() * 1000.0)
            .unwrap();

        let summary = graph.optimize().unwrap();
        assert!(summary.final_error < summary.initial_error);
        assert!(summary.final_error < 1e-8);

        let estimates = graph.estimates().unwrap();
        for (k, pose) in truth.iter().enumerate() {
            let est = estimates[&(k as u64)];
            assert_relative_eq!(est.translation.vector, pose.translation.vector, epsilon = 1e-4);
            assert!(est.rotation.angle_to(&pose.rotation) < 1e-4);
        }
    }

    #[test]
    fn test_non_convergence_keeps_estimates() {
        let config = PoseGraphConfig {
            max_iterations: 1,
            convergence_threshold: 0.0,
            step_tolerance: 0.0,
            ..Default::default()
        };
        let mut graph = PoseGraph::new(config);
        graph.add_variable(0, Pose3D::identity()).unwrap();
        let initial = Isometry3::translation(3.0, 1.0, 0.0) * from_yaw(1.0);
        graph.add_variable(1, initial).unwrap();
        graph
            .add_factor(0, 1, Isometry3::translation(1.0, 0.0, 0.0), Matrix6::identity())
            .unwrap();

        let err = graph.optimize().unwrap_err();
        assert!(matches!(err, Error::NonConvergence { iterations: 1, .. }));
        assert!(err.is_recoverable());
        assert_eq!(graph.node(1).unwrap().pose, initial);
        assert!(!graph.is_solved());
    }

    #[test]
    fn test_matrix_boundary() {
        let mut graph = PoseGraph::new(PoseGraphConfig::default());
        graph.add_variable_matrix(0, &Matrix4::identity()).unwrap();
        let mut m = Matrix4::identity();
        m[(0, 3)] = 1.5;
        graph.add_variable_matrix(1, &m).unwrap();
        graph.add_factor_matrix(0, 1, &m, Matrix6::identity()).unwrap();

        let mut bad = Matrix4::identity();
        bad[(0, 0)] = 2.0;
        assert!(matches!(
            graph.add_variable_matrix(2, &bad),
            Err(Error::InvalidInput(_))
        ));

        graph.optimize().unwrap();
        let out = graph.estimate_matrices().unwrap();
        assert_relative_eq!(out[&1], m, epsilon = 1e-9);
    }
}
