//! Collaborator seams: scan datasets and geometric verification.

use crate::core::{Point3D, PointCloud, Pose3D};
use crate::error::{Error, Result};

/// Indexed access to the scans of a sequence.
pub trait PointCloudSource {
    /// Number of scans.
    fn len(&self) -> usize;

    /// Whether the sequence is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan `index` in the sensor frame.
    fn scan(&self, index: usize) -> Result<PointCloud>;

    /// Ground-truth closure pairs `(earlier, later)`, when known.
    fn ground_truth_closures(&self) -> Option<&[(usize, usize)]> {
        None
    }
}

/// Refined alignment returned by a verifier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Registration {
    /// Transform mapping `source` points into the `target` frame.
    pub transform: Pose3D,
    /// Alignment quality in `[0, 1]` (fraction of inlier correspondences).
    pub fitness: f64,
}

/// External geometric registration (ICP, GICP, ...).
pub trait GeometricVerifier {
    /// Align `source` onto `target` starting from `initial`.
    fn verify(
        &self,
        source: &[Point3D],
        target: &[Point3D],
        initial: &Pose3D,
    ) -> Result<Registration>;
}

/// Scans held in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    scans: Vec<PointCloud>,
    closures: Option<Vec<(usize, usize)>>,
}

impl InMemorySource {
    /// Wrap a list of scans.
    pub fn new(scans: Vec<PointCloud>) -> Self {
        Self {
            scans,
            closures: None,
        }
    }

    /// Attach ground-truth closure pairs.
    pub fn with_ground_truth(mut self, closures: Vec<(usize, usize)>) -> Self {
        self.closures = Some(closures);
        self
    }

    /// Append a scan.
    pub fn push(&mut self, scan: PointCloud) {
        self.scans.push(scan);
    }
}

impl PointCloudSource for InMemorySource {
    fn len(&self) -> usize {
        self.scans.len()
    }

    fn scan(&self, index: usize) -> Result<PointCloud> {
        self.scans.get(index).cloned().ok_or(Error::NotFound {
            id: index,
            len: self.scans.len(),
        })
    }

    fn ground_truth_closures(&self) -> Option<&[(usize, usize)]> {
        self.closures.as_deref()
    }
}
