//! Fine shift matching between two Scan Contexts.
//!
//! For a shift Δ the candidate is compared as if rotated by Δ sectors:
//! query column `j` is paired with candidate column `(j - Δ) mod S`, which is
//! column `j` of `candidate.circshift(Δ)`. The best Δ gives the relative yaw
//! `Δ · 2π / S` from the query frame to the candidate frame.

use nalgebra::DVector;

use crate::descriptor::ScanContext;

/// Best shift hypothesis for one candidate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShiftMatch {
    /// Column shift applied to the candidate, in `[0, S)`.
    pub shift: usize,
    /// Mean column cosine distance, in `[0, 1]`.
    pub distance: f64,
}

impl ShiftMatch {
    /// Relative yaw in `[0, 2π)` for a descriptor with `num_sectors` columns.
    #[inline]
    pub fn yaw(&self, num_sectors: usize) -> f64 {
        self.shift as f64 * std::f64::consts::TAU / num_sectors as f64
    }
}

/// Cosine distance of two columns.
///
/// `None` when both columns are all zero (the column is not scored), `1.0`
/// when exactly one is.
pub fn column_distance(a: &[f64], b: &[f64]) -> Option<f64> {
    let norm_a = a.iter().map(|v| v * v).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f64>().sqrt();
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    pair_distance(dot, norm_a, norm_b)
}

#[inline]
fn pair_distance(dot: f64, norm_a: f64, norm_b: f64) -> Option<f64> {
    match (norm_a > 0.0, norm_b > 0.0) {
        (false, false) => None,
        (true, true) => Some((1.0 - dot / (norm_a * norm_b)).clamp(0.0, 1.0)),
        _ => Some(1.0),
    }
}

/// Scores shift hypotheses between descriptors of equal size.
#[derive(Clone, Copy, Debug, Default)]
pub struct ShiftMatcher {
    search_ratio: Option<f64>,
}

impl ShiftMatcher {
    /// Exhaustive matcher scoring every shift.
    pub fn exhaustive() -> Self {
        Self { search_ratio: None }
    }

    /// Matcher that pre-aligns with the sector key and scores only the
    /// shifts within `±round(ratio · S / 2)` of that alignment.
    pub fn with_search_ratio(ratio: Option<f64>) -> Self {
        Self {
            search_ratio: ratio,
        }
    }

    /// Distance of `candidate` shifted by `shift` columns against `query`.
    pub fn distance_at(&self, query: &ScanContext, candidate: &ScanContext, shift: usize) -> f64 {
        if !same_shape(query, candidate) {
            return 1.0;
        }
        let nq = column_norms(query);
        let nc = column_norms(candidate);
        shifted_distance(query, candidate, &nq, &nc, shift)
    }

    /// Best shift of `candidate` against `query`.
    ///
    /// Ties keep the smallest shift examined first. Returns distance 1.0 at
    /// shift 0 when the descriptor shapes differ.
    pub fn best_match(&self, query: &ScanContext, candidate: &ScanContext) -> ShiftMatch {
        if !same_shape(query, candidate) {
            return ShiftMatch {
                shift: 0,
                distance: 1.0,
            };
        }

        let nq = column_norms(query);
        let nc = column_norms(candidate);

        let mut best = ShiftMatch {
            shift: 0,
            distance: f64::INFINITY,
        };
        for shift in self.shifts(query, candidate) {
            let distance = shifted_distance(query, candidate, &nq, &nc, shift);
            if distance < best.distance {
                best = ShiftMatch { shift, distance };
            }
        }
        if !best.distance.is_finite() {
            best.distance = 1.0;
        }
        best
    }

    fn shifts(&self, query: &ScanContext, candidate: &ScanContext) -> Vec<usize> {
        let sectors = query.num_sectors();
        let Some(ratio) = self.search_ratio else {
            return (0..sectors).collect();
        };

        let radius = (0.5 * ratio * sectors as f64).round() as usize;
        if 2 * radius + 1 >= sectors {
            return (0..sectors).collect();
        }
        let center = align_sector_keys(&query.sector_key(), &candidate.sector_key());
        let mut shifts = Vec::with_capacity(2 * radius + 1);
        shifts.push(center);
        for offset in 1..=radius {
            shifts.push((center + offset) % sectors);
            shifts.push((center + sectors - offset) % sectors);
        }
        shifts
    }
}

/// Shift minimising the squared difference between two sector keys, with
/// the same column pairing as [`ShiftMatcher::best_match`].
pub fn align_sector_keys(query: &[f64], candidate: &[f64]) -> usize {
    let sectors = query.len();
    let mut best_shift = 0;
    let mut best_cost = f64::INFINITY;
    for shift in 0..sectors {
        let cost: f64 = (0..sectors)
            .map(|j| {
                let d = query[j] - candidate[(j + sectors - shift) % sectors];
                d * d
            })
            .sum();
        if cost < best_cost {
            best_cost = cost;
            best_shift = shift;
        }
    }
    best_shift
}

fn same_shape(a: &ScanContext, b: &ScanContext) -> bool {
    a.num_sectors() > 0 && a.num_sectors() == b.num_sectors() && a.num_rings() == b.num_rings()
}

fn column_norms(desc: &ScanContext) -> DVector<f64> {
    DVector::from_iterator(
        desc.num_sectors(),
        desc.matrix().column_iter().map(|c| c.norm()),
    )
}

fn shifted_distance(
    query: &ScanContext,
    candidate: &ScanContext,
    query_norms: &DVector<f64>,
    candidate_norms: &DVector<f64>,
    shift: usize,
) -> f64 {
    let sectors = query.num_sectors();
    let mut sum = 0.0;
    let mut counted = 0usize;
    for j in 0..sectors {
        let c = (j + sectors - shift % sectors) % sectors;
        let dot = query.column(j).dot(&candidate.column(c));
        if let Some(d) = pair_distance(dot, query_norms[j], candidate_norms[c]) {
            sum += d;
            counted += 1;
        }
    }
    if counted == 0 { 1.0 } else { sum / counted as f64 }
}
