//! Pose graph optimizer configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::robust::RobustKernel;

/// Linear solver used for each Levenberg-Marquardt step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LinearSolverKind {
    /// Dense up to `dense_threshold` unknowns, PCG above.
    #[default]
    Auto,
    /// Dense Cholesky factorization.
    Dense,
    /// Block-Jacobi preconditioned conjugate gradients.
    Pcg,
}

/// Configuration for [`super::PoseGraph::optimize`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseGraphConfig {
    /// Maximum Levenberg-Marquardt iterations.
    /// Default: 100
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Relative cost change below which the solve has converged.
    /// Default: 1e-6
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f64,

    /// Step norm (relative to the state) below which the solve has converged.
    /// Default: 1e-9
    #[serde(default = "default_step_tolerance")]
    pub step_tolerance: f64,

    /// Gradient max-norm below which the current state is optimal.
    /// Default: 1e-10
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,

    /// Initial Levenberg-Marquardt damping λ.
    /// Default: 1e-4
    #[serde(default = "default_damping_factor")]
    pub damping_factor: f64,

    /// Anchor the first added node.
    /// Default: true
    #[serde(default = "default_true")]
    pub fix_first_node: bool,

    /// Robust kernel applied to every factor.
    /// Default: none
    #[serde(default)]
    pub robust_kernel: RobustKernel,

    /// Linear solver.
    /// Default: auto
    #[serde(default)]
    pub linear_solver: LinearSolverKind,

    /// Largest number of unknowns solved densely under `auto`.
    /// Default: 1200 (200 free poses)
    #[serde(default = "default_dense_threshold")]
    pub dense_threshold: usize,

    /// PCG iteration cap per step.
    /// Default: 500
    #[serde(default = "default_pcg_max_iterations")]
    pub pcg_max_iterations: usize,

    /// PCG residual tolerance, relative to the right-hand side norm.
    /// Default: 1e-10
    #[serde(default = "default_pcg_tolerance")]
    pub pcg_tolerance: f64,
}

fn default_max_iterations() -> u32 {
    100
}

fn default_convergence_threshold() -> f64 {
    1e-6
}

fn default_step_tolerance() -> f64 {
    1e-9
}

fn default_gradient_tolerance() -> f64 {
    1e-10
}

fn default_damping_factor() -> f64 {
    1e-4
}

fn default_true() -> bool {
    true
}

fn default_dense_threshold() -> usize {
    1200
}

fn default_pcg_max_iterations() -> usize {
    500
}

fn default_pcg_tolerance() -> f64 {
    1e-10
}

impl Default for PoseGraphConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
            step_tolerance: default_step_tolerance(),
            gradient_tolerance: default_gradient_tolerance(),
            damping_factor: default_damping_factor(),
            fix_first_node: default_true(),
            robust_kernel: RobustKernel::default(),
            linear_solver: LinearSolverKind::default(),
            dense_threshold: default_dense_threshold(),
            pcg_max_iterations: default_pcg_max_iterations(),
            pcg_tolerance: default_pcg_tolerance(),
        }
    }
}

impl PoseGraphConfig {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be > 0".into()));
        }
        let non_negative = [
            ("convergence_threshold", self.convergence_threshold),
            ("step_tolerance", self.step_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
            ("pcg_tolerance", self.pcg_tolerance),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be finite and >= 0, got {}",
                    name, value
                )));
            }
        }
        if !(self.damping_factor.is_finite() && self.damping_factor > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "damping_factor must be positive, got {}",
                self.damping_factor
            )));
        }
        if !self.robust_kernel.is_valid() {
            return Err(Error::InvalidConfig(format!(
                "{} kernel parameter must be positive",
                self.robust_kernel.name()
            )));
        }
        Ok(())
    }
}
