//! Scan Context manager: the streaming front end of place recognition.

use log::{debug, info, warn};

use crate::core::Point3D;
use crate::descriptor::{DescriptorBuilder, ScanContext};
use crate::error::Result;

use super::config::ScanContextConfig;
use super::store::PlaceIndex;
use super::types::ClosureQuery;

/// Builds a descriptor for every incoming scan and answers closure queries
/// for the most recent one.
///
/// # Example
///
/// ```
/// use smriti::core::Point3D;
/// use smriti::place::{ScanContextConfig, ScanContextManager};
///
/// let mut config = ScanContextConfig::default();
/// config.place.exclusion_window = 2;
/// let mut manager = ScanContextManager::new(config).unwrap();
///
/// manager.process_new_scan(&[Point3D::new(5.0, 0.0, 1.0)]);
/// assert_eq!(manager.check_for_closure().query_index(), -1);
/// ```
pub struct ScanContextManager {
    config: ScanContextConfig,
    builder: DescriptorBuilder,
    index: PlaceIndex,
}

impl ScanContextManager {
    /// Create a manager. Fails with `InvalidConfig` on out-of-range settings.
    pub fn new(config: ScanContextConfig) -> Result<Self> {
        config.validate()?;
        let builder = DescriptorBuilder::new(config.descriptor.clone());
        let index = PlaceIndex::new(&config);
        info!(
            "[ScanContext] {}x{} descriptor, radius {:.1}m, window {}, {} candidates via {}",
            config.descriptor.num_rings,
            config.descriptor.num_sectors,
            config.descriptor.max_radius,
            config.place.exclusion_window,
            config.place.num_candidates,
            index.backend_name()
        );
        Ok(Self {
            config,
            builder,
            index,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &ScanContextConfig {
        &self.config
    }

    /// Number of processed scans.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no scan has been processed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Read access to the underlying index.
    pub fn index(&self) -> &PlaceIndex {
        &self.index
    }

    /// Build and store the descriptor of the next scan.
    ///
    /// The scan id is the number of previously processed scans. Empty or
    /// malformed clouds are stored as all-zero placeholders.
    pub fn process_new_scan(&mut self, points: &[Point3D]) {
        let (descriptor, key) = self.builder.build(points);
        if points.is_empty() || descriptor.is_empty() {
            debug!(
                "[ScanContext] scan {} produced an empty descriptor ({} points)",
                self.index.len(),
                points.len()
            );
        }
        if let Err(e) = self.index.insert(descriptor, key) {
            // Builder output always matches the index shape
            warn!("[ScanContext] failed to store scan: {}", e);
        }
    }

    /// Rank closure candidates for the most recently processed scan.
    ///
    /// Returns the `-1` sentinel while fewer than `exclusion_window + 1`
    /// scans exist.
    pub fn check_for_closure(&self) -> ClosureQuery {
        let Some(latest) = self.index.len().checked_sub(1) else {
            return ClosureQuery::none();
        };
        match self.index.query(
            latest,
            self.config.place.num_candidates,
            self.config.place.exclusion_window,
        ) {
            Ok(result) => {
                if result.is_none() {
                    debug!("[ScanContext] scan {}: insufficient history", latest);
                }
                result
            }
            Err(e) => {
                warn!("[ScanContext] query for scan {} failed: {}", latest, e);
                ClosureQuery::none()
            }
        }
    }

    /// Descriptor of `scan_id` as `matrix[ring][sector]`.
    pub fn get_scan_context(&self, scan_id: usize) -> Result<Vec<Vec<f64>>> {
        self.index.get(scan_id).map(ScanContext::to_rows)
    }

    /// Descriptor of `scan_id`.
    pub fn descriptor(&self, scan_id: usize) -> Result<&ScanContext> {
        self.index.get(scan_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn ring_of_points(radius: f64, height: f64) -> Vec<Point3D> {
        (0..90)
            .map(|i| {
                let a = i as f64 * 4f64.to_radians();
                Point3D::new(radius * a.cos(), radius * a.sin(), height + (i % 9) as f64 * 0.1)
            })
            .collect()
    }

    fn manager(window: usize) -> ScanContextManager {
        let mut config = ScanContextConfig::default();
        config.place.exclusion_window = window;
        config.place.num_candidates = 3;
        ScanContextManager::new(config).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ScanContextConfig::default();
        config.place.exclusion_window = 0;
        assert!(matches!(
            ScanContextManager::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sentinel_until_window_filled() {
        let mut m = manager(4);
        assert_eq!(m.check_for_closure().query_index(), -1);
        for i in 0..4 {
            m.process_new_scan(&ring_of_points(5.0 + i as f64, 0.0));
            let q = m.check_for_closure();
            assert_eq!(q.query_index(), -1);
            assert!(q.candidates.is_empty());
        }
        m.process_new_scan(&ring_of_points(5.0, 0.0));
        let q = m.check_for_closure();
        assert_eq!(q.query_index(), 4);
        assert_eq!(q.candidate_ids(), vec![0]);
    }

    #[test]
    fn test_empty_scans_stored() {
        let mut m = manager(2);
        m.process_new_scan(&[]);
        m.process_new_scan(&[Point3D::new(f64::NAN, 0.0, 0.0)]);
        assert_eq!(m.len(), 2);
        let rows = m.get_scan_context(0).unwrap();
        assert_eq!(rows.len(), 20);
        assert!(rows.iter().all(|r| r.len() == 60 && r.iter().all(|v| *v == 0.0)));
        assert!(matches!(
            m.get_scan_context(2),
            Err(Error::NotFound { id: 2, len: 2 })
        ));
    }

    #[test]
    fn test_empty_query_has_maximal_distance() {
        let mut m = manager(1);
        m.process_new_scan(&ring_of_points(10.0, 1.0));
        m.process_new_scan(&[]);
        let q = m.check_for_closure();
        assert_eq!(q.query_index(), 1);
        assert!(q.candidate_distances().iter().all(|d| *d == 1.0));
    }
}
