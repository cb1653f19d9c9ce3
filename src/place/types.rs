//! Records and query results of the place index.

use crate::descriptor::{RingKey, ScanContext};

/// One stored scan. Never mutated after insertion.
#[derive(Clone, Debug)]
pub struct ScanRecord {
    /// Sequential scan id, starting at 0.
    pub id: usize,
    /// Polar height descriptor.
    pub descriptor: ScanContext,
    /// Coarse retrieval key.
    pub ring_key: RingKey,
}

/// A scored candidate for one query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CandidateMatch {
    /// Earlier scan id.
    pub scan_id: usize,
    /// Match distance in `[0, 1]` (0 = identical).
    pub distance: f64,
    /// Relative yaw from the query frame to the candidate frame, `[0, 2π)`.
    pub yaw: f64,
}

/// Result of a closure query, ranked ascending by distance.
///
/// `query_id == None` is the "insufficient history" sentinel: not enough
/// scans exist for any candidate to be outside the exclusion window.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClosureQuery {
    /// Queried scan id, `None` for the sentinel.
    pub query_id: Option<usize>,
    /// Ranked candidates (empty for the sentinel).
    pub candidates: Vec<CandidateMatch>,
}

impl ClosureQuery {
    /// The "no query" sentinel.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this is the sentinel.
    #[inline]
    pub fn is_none(&self) -> bool {
        self.query_id.is_none()
    }

    /// Query id with `-1` as the sentinel.
    pub fn query_index(&self) -> i64 {
        self.query_id.map_or(-1, |id| id as i64)
    }

    /// Candidate ids in rank order.
    pub fn candidate_ids(&self) -> Vec<usize> {
        self.candidates.iter().map(|c| c.scan_id).collect()
    }

    /// Candidate distances in rank order.
    pub fn candidate_distances(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.distance).collect()
    }

    /// Candidate yaws in rank order.
    pub fn candidate_yaws(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.yaw).collect()
    }

    /// Top-ranked candidate.
    pub fn best(&self) -> Option<&CandidateMatch> {
        self.candidates.first()
    }
}
