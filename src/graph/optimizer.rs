//! Levenberg-Marquardt optimization over SE(3) poses.
//!
//! Minimizes
//!
//! ```text
//! F(x) = Σ ρ( e_ijᵀ Ω_ij e_ij ),   e_ij = log( T_j⁻¹ · T_i · Z_ij )
//! ```
//!
//! with right-multiplicative updates `T ← T · exp(δ)`. The Jacobians of the
//! residual are
//!
//! ```text
//! ∂e/∂δ_i =  Jr⁻¹(e) · Ad(Z⁻¹)
//! ∂e/∂δ_j = -Jr⁻¹(e) · Ad(E⁻¹),   E = T_j⁻¹ · T_i · Z
//! ```
//!
//! Each iteration solves `(H + λ·diag(max(H_kk, 1))) δ = -b`. A step that
//! increases the cost is rejected and λ grows by 10; an accepted step
//! shrinks λ by 10.

use log::{debug, trace};
use nalgebra::{DVector, Matrix6, Vector6};

use crate::core::Pose3D;
use crate::core::pose::{adjoint, exp, log, right_jacobian_inverse};

use super::config::{LinearSolverKind, PoseGraphConfig};
use super::linear::{BLOCK, BlockSystem};
use super::pose_graph::PoseFactor;

/// Largest damping before the solve is abandoned.
const MAX_LAMBDA: f64 = 1e10;

/// Smallest damping.
const MIN_LAMBDA: f64 = 1e-12;

/// Reason for optimization termination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Relative cost change below threshold.
    Converged,
    /// Step norm below tolerance.
    SmallStep,
    /// Gradient below tolerance (already at a minimum).
    SmallGradient,
    /// No factors or no free nodes.
    NothingToOptimize,
    /// Iteration budget exhausted.
    MaxIterations,
    /// Damping grew past its limit without an accepted step.
    Diverged,
}

impl TerminationReason {
    /// Whether this reason counts as a successful solve.
    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            TerminationReason::Converged
                | TerminationReason::SmallStep
                | TerminationReason::SmallGradient
                | TerminationReason::NothingToOptimize
        )
    }
}

/// Result of a Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct OptimizationSummary {
    /// Iterations performed (accepted and rejected).
    pub iterations: u32,
    /// Cost before optimization.
    pub initial_error: f64,
    /// Cost of the final state.
    pub final_error: f64,
    /// Reason for termination.
    pub termination: TerminationReason,
}

impl OptimizationSummary {
    /// Whether the run converged.
    pub fn converged(&self) -> bool {
        self.termination.is_converged()
    }
}

/// A factor resolved to variable slots.
pub(crate) struct ResolvedFactor<'a> {
    pub factor: &'a PoseFactor,
    pub from: usize,
    pub to: usize,
}

/// LM solver over a fixed set of nodes and factors.
pub(crate) struct LevenbergMarquardt<'a> {
    config: &'a PoseGraphConfig,
    factors: Vec<ResolvedFactor<'a>>,
    /// Variable slot of each node; `None` for fixed nodes.
    slots: Vec<Option<usize>>,
    num_free: usize,
}

impl<'a> LevenbergMarquardt<'a> {
    pub fn new(
        config: &'a PoseGraphConfig,
        factors: Vec<ResolvedFactor<'a>>,
        fixed: &[bool],
    ) -> Self {
        let mut num_free = 0;
        let slots = fixed
            .iter()
            .map(|&is_fixed| {
                if is_fixed {
                    None
                } else {
                    num_free += 1;
                    Some(num_free - 1)
                }
            })
            .collect();
        Self {
            config,
            factors,
            slots,
            num_free,
        }
    }

    /// Optimize `poses` in place. On non-convergence `poses` holds the last
    /// accepted state and the summary says why.
    pub fn run(&self, poses: &mut [Pose3D]) -> OptimizationSummary {
        let initial_error = self.cost(poses);
        if self.factors.is_empty() || self.num_free == 0 {
            return OptimizationSummary {
                iterations: 0,
                initial_error,
                final_error: initial_error,
                termination: TerminationReason::NothingToOptimize,
            };
        }

        let mut current_error = initial_error;
        let mut lambda = self.config.damping_factor;
        let mut iterations = 0;
        let mut candidate = poses.to_vec();

        while iterations < self.config.max_iterations {
            iterations += 1;

            let system = self.linearize(poses);
            let gradient_norm = system.gradient().amax();
            if gradient_norm < self.config.gradient_tolerance {
                return self.summary(
                    iterations,
                    initial_error,
                    current_error,
                    TerminationReason::SmallGradient,
                );
            }

            let Some(dx) = self.solve(&system, lambda) else {
                trace!("[LM] iteration {}: solve failed at λ={:.1e}", iterations, lambda);
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return self.summary(
                        iterations,
                        initial_error,
                        current_error,
                        TerminationReason::Diverged,
                    );
                }
                continue;
            };

            candidate.copy_from_slice(poses);
            self.apply_update(&mut candidate, &dx);
            let new_error = self.cost(&candidate);

            if !new_error.is_finite() || new_error > current_error {
                trace!(
                    "[LM] iteration {}: rejected ({:.6e} > {:.6e}), λ={:.1e}",
                    iterations, new_error, current_error, lambda
                );
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    return self.summary(
                        iterations,
                        initial_error,
                        current_error,
                        TerminationReason::Diverged,
                    );
                }
                continue;
            }

            poses.copy_from_slice(&candidate);
            lambda = (lambda * 0.1).max(MIN_LAMBDA);

            let relative_change = (current_error - new_error).abs() / current_error.max(1e-10);
            current_error = new_error;
            trace!(
                "[LM] iteration {}: error {:.6e} (Δrel {:.3e}), |dx| {:.3e}",
                iterations, current_error, relative_change, dx.norm()
            );

            if relative_change < self.config.convergence_threshold {
                return self.summary(
                    iterations,
                    initial_error,
                    current_error,
                    TerminationReason::Converged,
                );
            }
            let state_norm: f64 = poses
                .iter()
                .map(|p| p.translation.vector.norm_squared())
                .sum::<f64>()
                .sqrt();
            if dx.norm() <= self.config.step_tolerance * (state_norm + self.config.step_tolerance) {
                return self.summary(
                    iterations,
                    initial_error,
                    current_error,
                    TerminationReason::SmallStep,
                );
            }
        }

        self.summary(iterations, initial_error, current_error, TerminationReason::MaxIterations)
    }

    fn summary(
        &self,
        iterations: u32,
        initial_error: f64,
        final_error: f64,
        termination: TerminationReason,
    ) -> OptimizationSummary {
        debug!(
            "[LM] {:?} after {} iterations: {:.6e} -> {:.6e}",
            termination, iterations, initial_error, final_error
        );
        OptimizationSummary {
            iterations,
            initial_error,
            final_error,
            termination,
        }
    }

    /// Total robust cost.
    pub fn cost(&self, poses: &[Pose3D]) -> f64 {
        self.factors
            .iter()
            .map(|f| {
                let e = residual(&poses[f.from], &poses[f.to], &f.factor.measurement);
                let chi2 = e.dot(&(f.factor.information * e)).max(0.0);
                self.config.robust_kernel.cost(chi2)
            })
            .sum()
    }

    fn linearize(&self, poses: &[Pose3D]) -> BlockSystem {
        let mut system = BlockSystem::new(self.num_free);
        for f in &self.factors {
            let xi = &poses[f.from];
            let xj = &poses[f.to];
            let z = &f.factor.measurement;
            let omega = &f.factor.information;

            let error_pose = xj.inverse() * xi * z;
            let e = log(&error_pose);
            let jr_inv = right_jacobian_inverse(&e);
            let ji: Matrix6<f64> = jr_inv * adjoint(&z.inverse());
            let jj: Matrix6<f64> = -(jr_inv * adjoint(&error_pose.inverse()));

            let chi2 = e.dot(&(omega * e)).max(0.0);
            let w = self.config.robust_kernel.weight(chi2);
            let w_omega = omega * w;

            let slot_i = self.slots[f.from];
            let slot_j = self.slots[f.to];

            if let Some(si) = slot_i {
                let jt_o = ji.transpose() * w_omega;
                system.add_diagonal(si, &(jt_o * ji));
                system.add_gradient(si, &(jt_o * e));
                if let Some(sj) = slot_j {
                    system.add_off_diagonal(si, sj, &(jt_o * jj));
                }
            }
            if let Some(sj) = slot_j {
                let jt_o = jj.transpose() * w_omega;
                system.add_diagonal(sj, &(jt_o * jj));
                system.add_gradient(sj, &(jt_o * e));
            }
        }
        system
    }

    fn solve(&self, system: &BlockSystem, lambda: f64) -> Option<DVector<f64>> {
        let damping = system.damping(lambda);
        let use_dense = match self.config.linear_solver {
            LinearSolverKind::Dense => true,
            LinearSolverKind::Pcg => false,
            LinearSolverKind::Auto => system.dim() <= self.config.dense_threshold,
        };
        let dx = if use_dense {
            system.solve_dense(&damping)
        } else {
            system
                .solve_pcg(
                    &damping,
                    self.config.pcg_max_iterations,
                    self.config.pcg_tolerance,
                )
                .map(|(dx, _)| dx)
        };
        dx.filter(|dx| dx.iter().all(|v| v.is_finite()))
    }

    fn apply_update(&self, poses: &mut [Pose3D], dx: &DVector<f64>) {
        for (pose, slot) in poses.iter_mut().zip(self.slots.iter()) {
            if let Some(s) = slot {
                let delta: Vector6<f64> = dx.fixed_rows::<BLOCK>(s * BLOCK).into_owned();
                *pose *= exp(&delta);
            }
        }
    }
}

/// Residual twist `log(T_j⁻¹ · T_i · Z)`.
pub fn residual(from: &Pose3D, to: &Pose3D, measurement: &Pose3D) -> Vector6<f64> {
    log(&(to.inverse() * from * measurement))
}
