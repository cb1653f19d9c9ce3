//! Place-recognition evaluation.
//!
//! Every (query, candidate, distance) triple seen by the closure pipeline is
//! scored against ground-truth closure pairs over a sweep of distance
//! thresholds. Pairs are unordered and each is counted once.

mod precision_recall;

pub use precision_recall::{PrecisionRecall, PrecisionRecallCurve, ScoredCandidate};
