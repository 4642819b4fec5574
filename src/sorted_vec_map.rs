use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// A map that keeps its entries in a sorted `SmallVec`.
///
/// The store keys its per-asset series with it: the key set is fixed once the write phase ends,
/// lookups are binary searches and iteration follows key order, which keeps batch results and
/// snapshots deterministic.
///
/// # Type Parameters
///
/// - `N`: Inline capacity (default: 8). Entries stored before spilling to the heap.
///
/// # Performance Characteristics
///
/// - Insertion: O(n) - shifts later entries to keep the order
/// - Lookup: O(log n) - binary search
/// - Iteration: O(n) - sequential, or parallel via [`SortedVecMap::par_iter`]
///
/// # Examples
///
/// ```rust
/// # use barportal::sorted_vec_map::SortedVecMap;
/// # use barportal::data::domain::AssetId;
/// let mut map = SortedVecMap::new();
/// map.insert(AssetId(24), "AAPL");
/// map.insert(AssetId(8), "AMZN");
///
/// let keys: Vec<_> = map.keys().copied().collect();
/// assert_eq!(keys, vec![AssetId(8), AssetId(24)]);
/// assert_eq!(map.get(&AssetId(24)), Some(&"AAPL"));
/// assert!(!map.contains_key(&AssetId(1)));
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortedVecMap<K, V, const N: usize = 8> {
    inner: SmallVec<[(K, V); N]>,
}

impl<K, V> Default for SortedVecMap<K, V> {
    fn default() -> Self {
        Self {
            inner: SmallVec::new(),
        }
    }
}

impl<K: Ord, V> SortedVecMap<K, V> {
    #[inline]
    pub const fn new() -> Self {
        Self {
            inner: SmallVec::new_const(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: SmallVec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.search(key).is_ok()
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use barportal::sorted_vec_map::SortedVecMap;
    /// let mut map = SortedVecMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.search(key).ok().map(|i| &self.inner[i].1)
    }

    /// Inserts a key-value pair, maintaining sorted order.
    ///
    /// Returns the previous value if the key was already present.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use barportal::sorted_vec_map::SortedVecMap;
    /// let mut map = SortedVecMap::new();
    /// assert_eq!(map.insert(37, "a"), None);
    /// assert_eq!(map.insert(37, "b"), Some("a"));
    /// assert_eq!(map.get(&37), Some(&"b"));
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.search(&key) {
            Ok(i) => Some(std::mem::replace(&mut self.inner[i].1, value)),
            Err(i) => {
                self.inner.insert(i, (key, value));
                None
            }
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.inner.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.inner.iter().map(|(_, v)| v)
    }

    /// Iterates in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter().map(|(k, v)| (k, v))
    }

    fn search(&self, key: &K) -> Result<usize, usize> {
        self.inner.binary_search_by(|(k, _)| k.cmp(key))
    }
}

impl<K: Ord + Sync, V: Sync> SortedVecMap<K, V> {
    /// Returns a parallel iterator over the key-value pairs.
    #[inline]
    pub fn par_iter(&self) -> impl ParallelIterator<Item = (&K, &V)> {
        self.inner.par_iter().map(|(k, v)| (k, v))
    }
}

impl<K: Ord, V> FromIterator<(K, V)> for SortedVecMap<K, V> {
    /// Collects pairs; on duplicate keys the last value wins.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
