//! Destination ordered map over encoded tuples.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{ContentHash, ContentHasher, NewTuple};

/// Immutable, content-addressed map from key tuple to value tuple.
///
/// Clones share storage. New versions are derived from a baseline through
/// [`MapEditor`].
#[derive(Clone)]
pub struct TupleMap {
    entries: Arc<BTreeMap<NewTuple, NewTuple>>,
    hash: ContentHash,
}

impl TupleMap {
    pub fn empty() -> Self {
        Self::from_btree(BTreeMap::new())
    }

    fn from_btree(entries: BTreeMap<NewTuple, NewTuple>) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.write_str("tuple-map");
        hasher.write_u64(entries.len() as u64);
        for (k, v) in &entries {
            hasher.write(k.as_bytes());
            hasher.write(v.as_bytes());
        }
        Self {
            entries: Arc::new(entries),
            hash: hasher.finish(),
        }
    }

    pub fn hash(&self) -> ContentHash {
        self.hash
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &NewTuple) -> Option<&NewTuple> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NewTuple, &NewTuple)> {
        self.entries.iter()
    }

    /// Editor seeded with this map's entries.
    ///
    /// Storage stays shared until the first effective edit, which copies the
    /// map once (O(len)). Finishing an unedited editor returns this map
    /// without rehashing.
    pub fn editor(&self) -> MapEditor {
        MapEditor {
            entries: Arc::clone(&self.entries),
            baseline: self.hash,
            edited: false,
        }
    }
}

impl fmt::Debug for TupleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleMap")
            .field("hash", &self.hash)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl PartialEq for TupleMap {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for TupleMap {}

pub struct MapEditor {
    entries: Arc<BTreeMap<NewTuple, NewTuple>>,
    baseline: ContentHash,
    edited: bool,
}

impl MapEditor {
    pub fn put(&mut self, key: NewTuple, value: NewTuple) {
        if self.entries.get(&key) == Some(&value) {
            return;
        }
        Arc::make_mut(&mut self.entries).insert(key, value);
        self.edited = true;
    }

    pub fn delete(&mut self, key: &NewTuple) {
        if !self.entries.contains_key(key) {
            return;
        }
        Arc::make_mut(&mut self.entries).remove(key);
        self.edited = true;
    }

    pub fn finish(self) -> TupleMap {
        if !self.edited {
            return TupleMap {
                entries: self.entries,
                hash: self.baseline,
            };
        }
        TupleMap::from_btree(Arc::unwrap_or_clone(self.entries))
    }
}
