//! Robust loss functions for outlier rejection in pose graph optimization.
//!
//! Kernels map the weighted squared error `χ² = eᵀ Ω e` of a factor to a
//! robust cost and an IRLS weight, reducing the pull of false loop closures.
//! Thresholds are expressed on the Mahalanobis norm `sqrt(χ²)`.
//!
//! # Example
//!
//! ```
//! use smriti::graph::RobustKernel;
//!
//! let kernel = RobustKernel::Huber(0.5);
//! assert!(kernel.weight(1.0) < 1.0);
//! assert_eq!(kernel.weight(0.2), 1.0);
//! ```

use serde::{Deserialize, Serialize};

/// Robust kernel applied per factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RobustKernel {
    /// Plain least squares
    #[default]
    None,

    /// Quadratic below the threshold, linear above.
    Huber(f64),

    /// Heavy-tailed, strong outlier rejection.
    Cauchy(f64),
}

impl RobustKernel {
    /// IRLS weight for a factor with squared error `chi2`, in `(0, 1]`.
    pub fn weight(&self, chi2: f64) -> f64 {
        match *self {
            RobustKernel::None => 1.0,
            RobustKernel::Huber(t) if chi2 <= t * t => 1.0,
            RobustKernel::Huber(t) => t / chi2.sqrt(),
            RobustKernel::Cauchy(c) => {
                let c2 = c * c;
                c2 / (c2 + chi2)
            }
        }
    }

    /// Robust cost replacing `chi2` in the objective.
    pub fn cost(&self, chi2: f64) -> f64 {
        match *self {
            RobustKernel::None => chi2,
            RobustKernel::Huber(t) if chi2 <= t * t => chi2,
            RobustKernel::Huber(t) => 2.0 * t * chi2.sqrt() - t * t,
            RobustKernel::Cauchy(c) => {
                let c2 = c * c;
                c2 * (chi2 / c2).ln_1p()
            }
        }
    }

    /// Whether this kernel down-weights anything.
    pub fn is_robust(&self) -> bool {
        !matches!(self, RobustKernel::None)
    }

    /// Kernel name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RobustKernel::None => "None",
            RobustKernel::Huber(_) => "Huber",
            RobustKernel::Cauchy(_) => "Cauchy",
        }
    }

    /// Reject non-positive or non-finite parameters.
    pub fn is_valid(&self) -> bool {
        match self {
            RobustKernel::None => true,
            RobustKernel::Huber(p) | RobustKernel::Cauchy(p) => p.is_finite() && *p > 0.0,
        }
    }
}
