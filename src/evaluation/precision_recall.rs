//! Loop-closure precision/recall against ground-truth pairs.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::Path;

/// One scored (query, candidate) pair produced by place recognition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoredCandidate {
    /// Query scan id.
    pub query_id: usize,
    /// Candidate scan id.
    pub candidate_id: usize,
    /// Match distance (lower is more similar).
    pub distance: f64,
}

/// Precision and recall at one distance threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PrecisionRecall {
    /// Distance threshold (pairs with `distance < threshold` are predicted).
    pub threshold: f64,
    /// Predicted pairs that are ground-truth closures.
    pub true_positives: usize,
    /// Predicted pairs that are not.
    pub false_positives: usize,
    /// Ground-truth closures not predicted.
    pub false_negatives: usize,
    /// TP / (TP + FP); 1.0 when nothing is predicted.
    pub precision: f64,
    /// TP / (TP + FN); 1.0 when there is no ground truth.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1_score: f64,
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a <= b { (a, b) } else { (b, a) }
}

impl PrecisionRecall {
    /// Evaluate `scored` at `threshold`. Pairs are unordered and counted once.
    pub fn compute(
        scored: &[ScoredCandidate],
        ground_truth: &[(usize, usize)],
        threshold: f64,
    ) -> Self {
        let truth: HashSet<(usize, usize)> =
            ground_truth.iter().map(|&(a, b)| pair_key(a, b)).collect();
        let predicted: HashSet<(usize, usize)> = scored
            .iter()
            .filter(|c| c.distance < threshold)
            .map(|c| pair_key(c.query_id, c.candidate_id))
            .collect();

        let true_positives = predicted.intersection(&truth).count();
        let false_positives = predicted.len() - true_positives;
        let false_negatives = truth.len() - true_positives;

        let precision = if predicted.is_empty() {
            1.0
        } else {
            true_positives as f64 / predicted.len() as f64
        };
        let recall = if truth.is_empty() {
            1.0
        } else {
            true_positives as f64 / truth.len() as f64
        };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            threshold,
            true_positives,
            false_positives,
            false_negatives,
            precision,
            recall,
            f1_score,
        }
    }
}

/// Precision/recall over a sweep of thresholds.
#[derive(Clone, Debug, Default)]
pub struct PrecisionRecallCurve {
    points: Vec<PrecisionRecall>,
}

impl PrecisionRecallCurve {
    /// Evaluate every threshold.
    pub fn compute(
        scored: &[ScoredCandidate],
        ground_truth: &[(usize, usize)],
        thresholds: &[f64],
    ) -> Self {
        Self {
            points: thresholds
                .iter()
                .map(|&t| PrecisionRecall::compute(scored, ground_truth, t))
                .collect(),
        }
    }

    /// Points in threshold order.
    pub fn points(&self) -> &[PrecisionRecall] {
        &self.points
    }

    /// Point with the highest F1 score.
    pub fn best_f1(&self) -> Option<&PrecisionRecall> {
        self.points
            .iter()
            .max_by(|a, b| a.f1_score.total_cmp(&b.f1_score))
    }

    /// Highest recall among points with precision 1.0 (0 if none).
    pub fn max_recall_at_full_precision(&self) -> f64 {
        self.points
            .iter()
            .filter(|p| p.precision >= 1.0 && p.true_positives > 0)
            .map(|p| p.recall)
            .fold(0.0, f64::max)
    }

    /// Plain-text table, one row per threshold.
    pub fn to_table(&self) -> String {
        let mut out = String::from("threshold  tp  fp  fn  precision  recall  f1\n");
        for p in &self.points {
            let _ = writeln!(
                out,
                "{:.2}  {}  {}  {}  {:.4}  {:.4}  {:.4}",
                p.threshold,
                p.true_positives,
                p.false_positives,
                p.false_negatives,
                p.precision,
                p.recall,
                p.f1_score
            );
        }
        out
    }

    /// Write [`Self::to_table`] to `path`.
    pub fn write(&self, path: &Path) -> crate::error::Result<()> {
        std::fs::write(path, self.to_table())?;
        Ok(())
    }
}
