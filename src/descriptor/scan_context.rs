//! Scan Context descriptor and ring key.

use log::trace;
use nalgebra::{DMatrix, DVectorView};
use serde::{Deserialize, Serialize};

use crate::core::Point3D;
use crate::core::math::wrap_two_pi;

use super::config::DescriptorConfig;

/// Polar max-height descriptor of a single scan (rings × sectors).
///
/// Immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanContext {
    matrix: DMatrix<f64>,
}

impl ScanContext {
    /// All-zero descriptor (the placeholder for empty scans).
    pub fn zeros(num_rings: usize, num_sectors: usize) -> Self {
        Self {
            matrix: DMatrix::zeros(num_rings, num_sectors),
        }
    }

    /// Wrap an existing rings × sectors matrix.
    pub fn from_matrix(matrix: DMatrix<f64>) -> Self {
        Self { matrix }
    }

    /// Bin a point cloud.
    ///
    /// Each cell holds the maximum `z + sensor_height` of the points falling
    /// into it; cells without points hold 0. Non-finite points and points
    /// beyond `max_radius` are ignored, so an empty or fully malformed cloud
    /// yields the all-zero placeholder.
    pub fn from_points(points: &[Point3D], config: &DescriptorConfig) -> Self {
        let rings = config.num_rings;
        let sectors = config.num_sectors;
        let ring_width = config.ring_width();
        let sector_angle = config.sector_angle();

        let mut matrix = DMatrix::from_element(rings, sectors, f64::NEG_INFINITY);
        let mut skipped = 0usize;

        for point in points {
            if !point.is_finite() {
                skipped += 1;
                continue;
            }
            let range = point.planar_range();
            if range > config.max_radius {
                continue;
            }

            let ring = ((range / ring_width) as usize).min(rings - 1);
            let angle = wrap_two_pi(point.y.atan2(point.x));
            let sector = ((angle / sector_angle) as usize).min(sectors - 1);

            let height = point.z + config.sensor_height;
            let cell = &mut matrix[(ring, sector)];
            if height > *cell {
                *cell = height;
            }
        }

        if skipped > 0 {
            trace!("[ScanContext] ignored {} non-finite points", skipped);
        }

        matrix.apply(|v| {
            if *v == f64::NEG_INFINITY {
                *v = 0.0;
            }
        });

        Self { matrix }
    }

    /// Number of rings (rows).
    #[inline]
    pub fn num_rings(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of sectors (columns).
    #[inline]
    pub fn num_sectors(&self) -> usize {
        self.matrix.ncols()
    }

    /// Cell value at (ring, sector).
    #[inline]
    pub fn get(&self, ring: usize, sector: usize) -> f64 {
        self.matrix[(ring, sector)]
    }

    /// Underlying matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// One sector column (length = rings).
    #[inline]
    pub fn column(&self, sector: usize) -> DVectorView<'_, f64> {
        self.matrix.column(sector)
    }

    /// Whether every cell is zero.
    pub fn is_empty(&self) -> bool {
        self.matrix.iter().all(|v| *v == 0.0)
    }

    /// Row means: one rotation-invariant scalar per ring.
    pub fn ring_key(&self) -> RingKey {
        let sectors = self.num_sectors().max(1) as f64;
        RingKey(
            self.matrix
                .row_iter()
                .map(|row| row.sum() / sectors)
                .collect(),
        )
    }

    /// Column means: one scalar per sector.
    pub fn sector_key(&self) -> Vec<f64> {
        let rings = self.num_rings().max(1) as f64;
        self.matrix
            .column_iter()
            .map(|col| col.sum() / rings)
            .collect()
    }

    /// Cyclic column shift: column `(s + shift) mod S` of the result is
    /// column `s` of `self`.
    pub fn circshift(&self, shift: usize) -> Self {
        let sectors = self.num_sectors();
        if sectors == 0 {
            return self.clone();
        }
        let shift = shift % sectors;
        let mut shifted = DMatrix::zeros(self.num_rings(), sectors);
        for s in 0..sectors {
            shifted
                .column_mut((s + shift) % sectors)
                .copy_from(&self.matrix.column(s));
        }
        Self { matrix: shifted }
    }

    /// Row-major copy as `matrix[ring][sector]`.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        self.matrix
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}

/// Rotation-invariant coarse retrieval key (one value per ring).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingKey(pub Vec<f64>);

impl RingKey {
    /// Key values.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Key length (= number of rings).
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key has no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether all entries are zero (key of an empty scan).
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }

    /// Squared Euclidean distance to another key of the same length.
    pub fn distance_squared(&self, other: &RingKey) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Builds descriptors with a fixed configuration.
#[derive(Clone, Debug, Default)]
pub struct DescriptorBuilder {
    config: DescriptorConfig,
}

impl DescriptorBuilder {
    /// Create a builder. The configuration is assumed validated.
    pub fn new(config: DescriptorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    /// Build the descriptor and its ring key. Pure and deterministic.
    pub fn build(&self, points: &[Point3D]) -> (ScanContext, RingKey) {
        let descriptor = ScanContext::from_points(points, &self.config);
        let key = descriptor.ring_key();
        (descriptor, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn small_config() -> DescriptorConfig {
        DescriptorConfig {
            num_rings: 4,
            num_sectors: 8,
            max_radius: 8.0,
            sensor_height: 0.0,
        }
    }

    #[test]
    fn test_empty_cloud_is_zero() {
        let builder = DescriptorBuilder::new(DescriptorConfig::default());
        let (desc, key) = builder.build(&[]);
        assert_eq!(desc.num_rings(), 20);
        assert_eq!(desc.num_sectors(), 60);
        assert!(desc.is_empty());
        assert!(key.is_zero());
    }

    #[test]
    fn test_binning_takes_max_height() {
        let config = small_config();
        let points = [
            Point3D::new(1.0, 0.1, 0.5),
            Point3D::new(1.5, 0.1, 1.5),
            Point3D::new(1.2, 0.2, 1.0),
        ];
        let desc = ScanContext::from_points(&points, &config);
        // range ~1-1.5 m -> ring 0, angle ~0.1 rad -> sector 0
        assert_relative_eq!(desc.get(0, 0), 1.5);
        assert_eq!(desc.matrix().iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_sector_zero_aligned_with_x_axis() {
        let config = small_config();
        // +Y is a quarter turn: sector 2 of 8
        let desc = ScanContext::from_points(&[Point3D::new(-0.1, 3.0, 1.0)], &config);
        assert_relative_eq!(desc.get(1, 2), 1.0);
        // -Y is three quarters: sector 6
        let desc = ScanContext::from_points(&[Point3D::new(0.1, -3.0, 1.0)], &config);
        assert_relative_eq!(desc.get(1, 6), 1.0);
    }

    #[test]
    fn test_points_beyond_radius_discarded() {
        let config = small_config();
        let desc = ScanContext::from_points(&[Point3D::new(9.0, 0.0, 1.0)], &config);
        assert!(desc.is_empty());

        // Exactly at the radius lands in the last ring
        let desc = ScanContext::from_points(&[Point3D::new(8.0, 0.0, 1.0)], &config);
        assert_relative_eq!(desc.get(3, 0), 1.0);
    }

    #[test]
    fn test_sensor_height_offset() {
        let config = DescriptorConfig {
            sensor_height: 2.0,
            ..small_config()
        };
        let desc = ScanContext::from_points(&[Point3D::new(1.0, 0.0, -1.5)], &config);
        assert_relative_eq!(desc.get(0, 0), 0.5);

        // Below the ground plane keeps its negative height
        let desc = ScanContext::from_points(&[Point3D::new(1.0, 0.0, -3.0)], &config);
        assert_relative_eq!(desc.get(0, 0), -1.0);
    }

    #[test]
    fn test_non_finite_points_ignored() {
        let config = small_config();
        let points = [
            Point3D::new(f64::NAN, 1.0, 1.0),
            Point3D::new(1.0, 0.0, f64::INFINITY),
        ];
        assert!(ScanContext::from_points(&points, &config).is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = DescriptorBuilder::new(small_config());
        let points: Vec<Point3D> = (0..200)
            .map(|i| {
                let a = i as f64 * 0.37;
                Point3D::new(a.cos() * (i % 7) as f64, a.sin() * (i % 5) as f64, (i % 3) as f64)
            })
            .collect();
        let (d1, k1) = builder.build(&points);
        let (d2, k2) = builder.build(&points);
        assert_eq!(d1, d2);
        assert_eq!(k1, k2);
    }

    #[test]
    fn test_ring_key_is_row_mean() {
        let config = small_config();
        let desc = ScanContext::from_points(
            &[Point3D::new(1.0, 0.1, 4.0), Point3D::new(-1.0, 0.1, 2.0)],
            &config,
        );
        let key = desc.ring_key();
        assert_eq!(key.len(), 4);
        assert_relative_eq!(key.as_slice()[0], 6.0 / 8.0);
        assert_relative_eq!(key.as_slice()[1], 0.0);
    }

    #[test]
    fn test_circshift() {
        let config = small_config();
        let desc = ScanContext::from_points(&[Point3D::new(1.0, 0.1, 1.0)], &config);
        let shifted = desc.circshift(3);
        assert_relative_eq!(shifted.get(0, 3), 1.0);
        assert_relative_eq!(shifted.get(0, 0), 0.0);
        assert_eq!(desc.circshift(8), desc);
        assert_eq!(desc.ring_key(), shifted.ring_key());
    }

    #[test]
    fn test_to_rows_layout() {
        let config = small_config();
        let desc = ScanContext::from_points(&[Point3D::new(-0.1, 3.0, 1.0)], &config);
        let rows = desc.to_rows();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].len(), 8);
        assert_relative_eq!(rows[1][2], 1.0);
    }
}
