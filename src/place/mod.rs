//! Place recognition: scan history, coarse retrieval and fine matching.
//!
//! Retrieval is two-stage:
//!
//! 1. **Coarse**: the ring key of the query is looked up in a
//!    [`KeyIndex`] (k-d tree or brute force). Only scans older than the
//!    exclusion window are kept.
//! 2. **Fine**: every surviving candidate is scored against the query over
//!    all column shifts by [`ShiftMatcher`]. The best shift yields the match
//!    distance and the relative yaw.
//!
//! Acceptance thresholds are left to the caller.

mod config;
mod index;
mod manager;
mod matcher;
mod store;
mod types;

pub use config::{PlaceConfig, RetrievalBackend, ScanContextConfig};
pub use index::{BruteForceIndex, KdTreeIndex, KeyIndex, create_key_index};
pub use manager::ScanContextManager;
pub use matcher::{ShiftMatch, ShiftMatcher, align_sector_keys, column_distance};
pub use store::PlaceIndex;
pub use types::{CandidateMatch, ClosureQuery, ScanRecord};
