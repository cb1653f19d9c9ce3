//! Coarse ring-key retrieval.
//!
//! Fine matching never looks at the retrieval structure directly: it only
//! receives a list of scan ids ranked by ring-key distance. Implementations
//! of [`KeyIndex`] can therefore be swapped without touching the matcher.

use kiddo::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use log::{trace, warn};

use crate::error::{Error, Result};

use super::config::RetrievalBackend;

/// Nearest-neighbour structure over ring keys.
pub trait KeyIndex: Send + Sync {
    /// Add the key of `scan_id`. Ids are inserted in increasing order.
    fn insert(&mut self, scan_id: usize, key: &[f64]) -> Result<()>;

    /// Up to `n` stored ids nearest to `key`, as `(scan_id, squared distance)`
    /// sorted ascending by distance.
    fn nearest(&self, key: &[f64], n: usize) -> Vec<(usize, f64)>;

    /// Number of stored keys.
    fn len(&self) -> usize;

    /// Whether no keys are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;
}

/// Linear scan over every stored key. Exact; fine for small corpora.
#[derive(Clone, Debug, Default)]
pub struct BruteForceIndex {
    ids: Vec<usize>,
    keys: Vec<Vec<f64>>,
}

impl BruteForceIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyIndex for BruteForceIndex {
    fn insert(&mut self, scan_id: usize, key: &[f64]) -> Result<()> {
        if let Some(first) = self.keys.first() {
            if first.len() != key.len() {
                return Err(Error::InvalidInput(format!(
                    "ring key length {} does not match index dimension {}",
                    key.len(),
                    first.len()
                )));
            }
        }
        self.ids.push(scan_id);
        self.keys.push(key.to_vec());
        Ok(())
    }

    fn nearest(&self, key: &[f64], n: usize) -> Vec<(usize, f64)> {
        let mut scored: Vec<(usize, f64)> = self
            .ids
            .iter()
            .zip(self.keys.iter())
            .map(|(&id, stored)| (id, squared_distance(stored, key)))
            .collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
    }

    fn len(&self) -> usize {
        self.ids.len()
    }

    fn name(&self) -> &'static str {
        "brute_force"
    }
}

/// Inserts between two k-d tree rebuilds.
pub const TREE_REBUILD_PERIOD: usize = 50;

/// k-d tree over `K`-dimensional ring keys.
///
/// Keys are kept in insertion order. An immutable `kiddo` tree covers the
/// first `indexed` of them and is rebuilt every [`TREE_REBUILD_PERIOD`]
/// inserts; keys added since the last rebuild are scanned linearly, so
/// lookups stay exact between rebuilds. The immutable tree accepts any
/// number of keys sharing a coordinate (rings empty in every scan).
pub struct KdTreeIndex<const K: usize> {
    ids: Vec<usize>,
    keys: Vec<[f64; K]>,
    tree: Option<ImmutableKdTree<f64, u64, K, 32>>,
    indexed: usize,
    rebuild_period: usize,
}

impl<const K: usize> KdTreeIndex<K> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::with_rebuild_period(TREE_REBUILD_PERIOD)
    }

    /// Create an empty tree rebuilt every `period` inserts (at least 1).
    pub fn with_rebuild_period(period: usize) -> Self {
        Self {
            ids: Vec::new(),
            keys: Vec::new(),
            tree: None,
            indexed: 0,
            rebuild_period: period.max(1),
        }
    }

    /// Number of keys covered by the tree; the rest are scanned linearly.
    pub fn indexed(&self) -> usize {
        self.indexed
    }

    fn to_point(key: &[f64]) -> Result<[f64; K]> {
        key.try_into().map_err(|_| {
            Error::InvalidInput(format!(
                "ring key length {} does not match tree dimension {}",
                key.len(),
                K
            ))
        })
    }

    fn rebuild(&mut self) {
        let tree: ImmutableKdTree<f64, u64, K, 32> = (&*self.keys).into();
        self.tree = Some(tree);
        self.indexed = self.keys.len();
        trace!("[KeyIndex] rebuilt k-d tree over {} keys", self.indexed);
    }
}

impl<const K: usize> Default for KdTreeIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> KeyIndex for KdTreeIndex<K> {
    fn insert(&mut self, scan_id: usize, key: &[f64]) -> Result<()> {
        let point = Self::to_point(key)?;
        self.ids.push(scan_id);
        self.keys.push(point);
        if self.keys.len() - self.indexed >= self.rebuild_period {
            self.rebuild();
        }
        Ok(())
    }

    fn nearest(&self, key: &[f64], n: usize) -> Vec<(usize, f64)> {
        if n == 0 || self.keys.is_empty() {
            return Vec::new();
        }
        let Ok(point) = Self::to_point(key) else {
            return Vec::new();
        };

        let mut scored: Vec<(usize, f64)> = match &self.tree {
            Some(tree) => tree
                .nearest_n::<SquaredEuclidean>(&point, n.min(self.indexed))
                .into_iter()
                .map(|nn| (self.ids[nn.item as usize], nn.distance))
                .collect(),
            None => Vec::new(),
        };
        scored.extend(
            self.ids[self.indexed..]
                .iter()
                .zip(&self.keys[self.indexed..])
                .map(|(&id, stored)| (id, squared_distance(stored, &point))),
        );
        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(n);
        scored
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn name(&self) -> &'static str {
        "kd_tree"
    }
}

#[inline]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Create the configured backend for keys of length `num_rings`.
///
/// The tree needs its dimension at compile time; ring counts without an
/// instantiation use brute force.
pub fn create_key_index(backend: RetrievalBackend, num_rings: usize) -> Box<dyn KeyIndex> {
    match backend {
        RetrievalBackend::BruteForce => Box::new(BruteForceIndex::new()),
        RetrievalBackend::KdTree => match num_rings {
            10 => Box::new(KdTreeIndex::<10>::new()),
            20 => Box::new(KdTreeIndex::<20>::new()),
            40 => Box::new(KdTreeIndex::<40>::new()),
            other => {
                warn!(
                    "[KeyIndex] no k-d tree for {} rings, using brute force",
                    other
                );
                Box::new(BruteForceIndex::new())
            }
        },
    }
}
