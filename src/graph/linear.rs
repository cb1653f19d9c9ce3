//! Block-sparse normal equations and their solvers.
//!
//! The Gauss-Newton Hessian of a pose graph is made of 6×6 blocks: one per
//! free node on the diagonal and one per pair of free nodes sharing a
//! factor. Only the upper triangle is stored.

use std::collections::BTreeMap;

use log::trace;
use nalgebra::{DMatrix, DVector, Matrix6, Vector6};

/// Block size (SE(3) tangent dimension).
pub const BLOCK: usize = 6;

/// Normal equations `H dx = -b` over `n` free 6-DOF variables.
#[derive(Clone, Debug)]
pub struct BlockSystem {
    diagonal: Vec<Matrix6<f64>>,
    upper: BTreeMap<(usize, usize), Matrix6<f64>>,
    gradient: DVector<f64>,
}

/// Outcome of a conjugate-gradient solve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PcgResult {
    /// Iterations performed.
    pub iterations: usize,
    /// Final residual norm.
    pub residual_norm: f64,
    /// Whether the tolerance was reached.
    pub converged: bool,
}

impl BlockSystem {
    /// Zero system over `num_blocks` variables.
    pub fn new(num_blocks: usize) -> Self {
        Self {
            diagonal: vec![Matrix6::zeros(); num_blocks],
            upper: BTreeMap::new(),
            gradient: DVector::zeros(num_blocks * BLOCK),
        }
    }

    /// Number of 6-DOF variables.
    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.diagonal.len()
    }

    /// Number of scalar unknowns.
    #[inline]
    pub fn dim(&self) -> usize {
        self.diagonal.len() * BLOCK
    }

    /// Number of stored off-diagonal blocks.
    pub fn num_off_diagonal(&self) -> usize {
        self.upper.len()
    }

    /// Gradient vector `b`.
    pub fn gradient(&self) -> &DVector<f64> {
        &self.gradient
    }

    /// Accumulate `H_ii += block`.
    pub fn add_diagonal(&mut self, i: usize, block: &Matrix6<f64>) {
        self.diagonal[i] += block;
    }

    /// Accumulate `H_ij += block` (and implicitly `H_ji += blockᵀ`).
    pub fn add_off_diagonal(&mut self, i: usize, j: usize, block: &Matrix6<f64>) {
        if i < j {
            *self.upper.entry((i, j)).or_insert_with(Matrix6::zeros) += block;
        } else if j < i {
            *self.upper.entry((j, i)).or_insert_with(Matrix6::zeros) += block.transpose();
        } else {
            self.diagonal[i] += block + block.transpose();
        }
    }

    /// Accumulate `b_i += v`.
    pub fn add_gradient(&mut self, i: usize, v: &Vector6<f64>) {
        let mut seg = self.gradient.fixed_rows_mut::<BLOCK>(i * BLOCK);
        seg += v;
    }

    /// Levenberg-Marquardt damping `λ · max(H_kk, 1)` for every scalar
    /// diagonal entry.
    pub fn damping(&self, lambda: f64) -> DVector<f64> {
        DVector::from_iterator(
            self.dim(),
            self.diagonal
                .iter()
                .flat_map(|block| (0..BLOCK).map(move |k| lambda * block[(k, k)].max(1.0))),
        )
    }

    /// Dense copy of `H + diag(damping)`.
    pub fn to_dense(&self, damping: &DVector<f64>) -> DMatrix<f64> {
        let n = self.dim();
        let mut h = DMatrix::zeros(n, n);
        for (i, block) in self.diagonal.iter().enumerate() {
            h.fixed_view_mut::<BLOCK, BLOCK>(i * BLOCK, i * BLOCK)
                .copy_from(block);
        }
        for (&(i, j), block) in &self.upper {
            h.fixed_view_mut::<BLOCK, BLOCK>(i * BLOCK, j * BLOCK)
                .copy_from(block);
            h.fixed_view_mut::<BLOCK, BLOCK>(j * BLOCK, i * BLOCK)
                .copy_from(&block.transpose());
        }
        for k in 0..n {
            h[(k, k)] += damping[k];
        }
        h
    }

    /// `y = (H + diag(damping)) x`.
    pub fn multiply(&self, x: &DVector<f64>, damping: &DVector<f64>) -> DVector<f64> {
        let mut y = x.component_mul(damping);
        for (i, block) in self.diagonal.iter().enumerate() {
            let xi = x.fixed_rows::<BLOCK>(i * BLOCK);
            let mut yi = y.fixed_rows_mut::<BLOCK>(i * BLOCK);
            yi += block * xi;
        }
        for (&(i, j), block) in &self.upper {
            let xi: Vector6<f64> = x.fixed_rows::<BLOCK>(i * BLOCK).into_owned();
            let xj: Vector6<f64> = x.fixed_rows::<BLOCK>(j * BLOCK).into_owned();
            {
                let mut yi = y.fixed_rows_mut::<BLOCK>(i * BLOCK);
                yi += block * xj;
            }
            let mut yj = y.fixed_rows_mut::<BLOCK>(j * BLOCK);
            yj += block.transpose() * xi;
        }
        y
    }

    /// Solve `(H + D) dx = -b` by dense Cholesky. `None` if not positive
    /// definite.
    pub fn solve_dense(&self, damping: &DVector<f64>) -> Option<DVector<f64>> {
        let h = self.to_dense(damping);
        let chol = h.cholesky()?;
        Some(chol.solve(&(-&self.gradient)))
    }

    /// Solve `(H + D) dx = -b` by block-Jacobi preconditioned CG.
    ///
    /// `None` if the preconditioner or the system is not positive definite.
    pub fn solve_pcg(
        &self,
        damping: &DVector<f64>,
        max_iterations: usize,
        tolerance: f64,
    ) -> Option<(DVector<f64>, PcgResult)> {
        let n = self.dim();
        let preconditioner = self.block_jacobi(damping)?;
        let rhs = -&self.gradient;
        let tol = tolerance * rhs.norm().max(f64::MIN_POSITIVE);

        let mut x = DVector::zeros(n);
        let mut r = rhs;
        let mut residual_norm = r.norm();
        if residual_norm <= tol {
            return Some((
                x,
                PcgResult {
                    iterations: 0,
                    residual_norm,
                    converged: true,
                },
            ));
        }

        let mut z = apply_preconditioner(&preconditioner, &r);
        let mut p = z.clone();
        let mut rz_old = r.dot(&z);

        for iter in 0..max_iterations {
            let hp = self.multiply(&p, damping);
            let denom = p.dot(&hp);
            if denom <= 0.0 || !denom.is_finite() {
                return None;
            }
            let alpha = rz_old / denom;
            x.axpy(alpha, &p, 1.0);
            r.axpy(-alpha, &hp, 1.0);
            residual_norm = r.norm();
            if residual_norm <= tol {
                return Some((
                    x,
                    PcgResult {
                        iterations: iter + 1,
                        residual_norm,
                        converged: true,
                    },
                ));
            }

            z = apply_preconditioner(&preconditioner, &r);
            let rz_new = r.dot(&z);
            if rz_old.abs() < 1e-300 {
                break;
            }
            let beta = rz_new / rz_old;
            p = &z + &p * beta;
            rz_old = rz_new;
        }

        trace!(
            "[PCG] stopped after {} iterations, residual {:.3e}",
            max_iterations, residual_norm
        );
        Some((
            x,
            PcgResult {
                iterations: max_iterations,
                residual_norm,
                converged: false,
            },
        ))
    }

    fn block_jacobi(&self, damping: &DVector<f64>) -> Option<Vec<Matrix6<f64>>> {
        self.diagonal
            .iter()
            .enumerate()
            .map(|(i, block)| {
                let mut damped = *block;
                for k in 0..BLOCK {
                    damped[(k, k)] += damping[i * BLOCK + k];
                }
                damped.cholesky().map(|c| c.inverse())
            })
            .collect()
    }
}

fn apply_preconditioner(inverses: &[Matrix6<f64>], r: &DVector<f64>) -> DVector<f64> {
    let mut z = DVector::zeros(r.len());
    for (i, inv) in inverses.iter().enumerate() {
        let ri = r.fixed_rows::<BLOCK>(i * BLOCK);
        z.fixed_rows_mut::<BLOCK>(i * BLOCK).copy_from(&(inv * ri));
    }
    z
}
