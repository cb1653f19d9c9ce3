//! Append-only scan history with coarse-to-fine retrieval.

use log::trace;

use crate::descriptor::{RingKey, ScanContext};
use crate::error::{Error, Result};

use super::config::ScanContextConfig;
use super::index::{KeyIndex, create_key_index};
use super::matcher::ShiftMatcher;
use super::types::{CandidateMatch, ClosureQuery, ScanRecord};

/// Stored scans plus the coarse ring-key index over them.
pub struct PlaceIndex {
    records: Vec<ScanRecord>,
    keys: Box<dyn KeyIndex>,
    matcher: ShiftMatcher,
    num_rings: usize,
    num_sectors: usize,
}

impl PlaceIndex {
    /// Create an index with the configured backend and matcher.
    pub fn new(config: &ScanContextConfig) -> Self {
        Self::with_key_index(
            create_key_index(config.place.retrieval, config.descriptor.num_rings),
            ShiftMatcher::with_search_ratio(config.place.search_ratio),
            config.descriptor.num_rings,
            config.descriptor.num_sectors,
        )
    }

    /// Create an index over a caller-supplied retrieval structure.
    pub fn with_key_index(
        keys: Box<dyn KeyIndex>,
        matcher: ShiftMatcher,
        num_rings: usize,
        num_sectors: usize,
    ) -> Self {
        Self {
            records: Vec::new(),
            keys,
            matcher,
            num_rings,
            num_sectors,
        }
    }

    /// Number of stored scans.
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no scans are stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Name of the coarse retrieval backend.
    pub fn backend_name(&self) -> &'static str {
        self.keys.name()
    }

    /// Append a scan and return its id.
    ///
    /// Fails with `InvalidInput` when the descriptor shape differs from the
    /// index; nothing is stored in that case.
    pub fn insert(&mut self, descriptor: ScanContext, ring_key: RingKey) -> Result<usize> {
        if descriptor.num_rings() != self.num_rings
            || descriptor.num_sectors() != self.num_sectors
            || ring_key.len() != self.num_rings
        {
            return Err(Error::InvalidInput(format!(
                "descriptor {}x{} (key {}) does not match index {}x{}",
                descriptor.num_rings(),
                descriptor.num_sectors(),
                ring_key.len(),
                self.num_rings,
                self.num_sectors
            )));
        }

        let id = self.records.len();
        if !ring_key.is_zero() {
            self.keys.insert(id, ring_key.as_slice())?;
        } else {
            trace!("[PlaceIndex] scan {} has an empty descriptor", id);
        }
        self.records.push(ScanRecord {
            id,
            descriptor,
            ring_key,
        });
        Ok(id)
    }

    /// Stored record.
    pub fn record(&self, scan_id: usize) -> Result<&ScanRecord> {
        self.records.get(scan_id).ok_or(Error::NotFound {
            id: scan_id,
            len: self.records.len(),
        })
    }

    /// Stored descriptor.
    pub fn get(&self, scan_id: usize) -> Result<&ScanContext> {
        self.record(scan_id).map(|r| &r.descriptor)
    }

    /// Rank up to `k` candidates for `scan_id` among scans with
    /// `id <= scan_id - exclusion_window`.
    ///
    /// Returns the sentinel when fewer than `exclusion_window + 1` scans are
    /// stored or no scan is old enough.
    pub fn query(&self, scan_id: usize, k: usize, exclusion_window: usize) -> Result<ClosureQuery> {
        let query = self.record(scan_id)?;
        let window = exclusion_window.max(1);

        if self.records.len() < window + 1 || scan_id < window {
            return Ok(ClosureQuery::none());
        }
        let newest_eligible = scan_id - window;
        if k == 0 {
            return Ok(ClosureQuery {
                query_id: Some(scan_id),
                candidates: Vec::new(),
            });
        }

        // Enough neighbours that k eligible ones survive the id filter
        let ineligible = self.records.len() - (newest_eligible + 1);
        let wanted = (k + ineligible).min(self.keys.len());

        let mut candidates: Vec<CandidateMatch> = self
            .keys
            .nearest(query.ring_key.as_slice(), wanted)
            .into_iter()
            .filter(|(id, _)| *id <= newest_eligible)
            .take(k)
            .map(|(id, _)| {
                let candidate = &self.records[id].descriptor;
                let m = self.matcher.best_match(&query.descriptor, candidate);
                CandidateMatch {
                    scan_id: id,
                    distance: m.distance,
                    yaw: m.yaw(self.num_sectors),
                }
            })
            .collect();

        candidates.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        Ok(ClosureQuery {
            query_id: Some(scan_id),
            candidates,
        })
    }
}
