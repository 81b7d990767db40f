//! Legacy content-addressed ordered map and its structural diff.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{ContentHash, ContentHasher, LegacyTuple};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One changed key between two legacy maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowDiff {
    pub key: LegacyTuple,
    pub old: Option<LegacyTuple>,
    pub new: Option<LegacyTuple>,
    pub kind: ChangeKind,
}

/// Immutable, content-addressed ordered map of legacy tuples.
///
/// Clones share storage; edits go through [`LegacyMapEditor`] and yield a new
/// map with a new address.
#[derive(Clone)]
pub struct LegacyMap {
    entries: Arc<BTreeMap<LegacyTuple, LegacyTuple>>,
    hash: ContentHash,
}

impl LegacyMap {
    pub fn empty() -> Self {
        Self::from_btree(BTreeMap::new())
    }

    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (LegacyTuple, LegacyTuple)>,
    {
        Self::from_btree(entries.into_iter().collect())
    }

    fn from_btree(entries: BTreeMap<LegacyTuple, LegacyTuple>) -> Self {
        let hash = address_of(&entries);
        Self {
            entries: Arc::new(entries),
            hash,
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

    pub fn get(&self, key: &LegacyTuple) -> Option<&LegacyTuple> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LegacyTuple, &LegacyTuple)> {
        self.entries.iter()
    }

    pub fn editor(&self) -> LegacyMapEditor {
        LegacyMapEditor {
            entries: (*self.entries).clone(),
        }
    }

    /// Emit every key that differs between `base` and `self`, in ascending
    /// key order. Maps with the same address are skipped without a walk.
    ///
    /// `emit` errors stop the walk and are returned unchanged.
    pub fn diff<E, F>(&self, base: &LegacyMap, mut emit: F) -> Result<(), E>
    where
        F: FnMut(RowDiff) -> Result<(), E>,
    {
        if self.hash == base.hash {
            return Ok(());
        }
        let mut old = base.entries.iter().peekable();
        let mut new = self.entries.iter().peekable();
        loop {
            let order = match (old.peek(), new.peek()) {
                (None, None) => return Ok(()),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((ok, _)), Some((nk, _))) => ok.cmp(nk),
            };
            let diff = match order {
                Ordering::Less => old.next().map(|(k, v)| removed(k, v)),
                Ordering::Greater => new.next().map(|(k, v)| added(k, v)),
                Ordering::Equal => match (old.next(), new.next()) {
                    (Some((_, ov)), Some((nk, nv))) if ov != nv => Some(RowDiff {
                        key: nk.clone(),
                        old: Some(ov.clone()),
                        new: Some(nv.clone()),
                        kind: ChangeKind::Modified,
                    }),
                    _ => None,
                },
            };
            if let Some(diff) = diff {
                emit(diff)?;
            }
        }
    }
}

fn added(key: &LegacyTuple, value: &LegacyTuple) -> RowDiff {
    RowDiff {
        key: key.clone(),
        old: None,
        new: Some(value.clone()),
        kind: ChangeKind::Added,
    }
}

fn removed(key: &LegacyTuple, value: &LegacyTuple) -> RowDiff {
    RowDiff {
        key: key.clone(),
        old: Some(value.clone()),
        new: None,
        kind: ChangeKind::Removed,
    }
}

fn address_of(entries: &BTreeMap<LegacyTuple, LegacyTuple>) -> ContentHash {
    let mut hasher = ContentHasher::new();
    hasher.write_str("legacy-map");
    hasher.write_u64(entries.len() as u64);
    for (k, v) in entries {
        k.hash_into(&mut hasher);
        v.hash_into(&mut hasher);
    }
    hasher.finish()
}

impl fmt::Debug for LegacyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyMap")
            .field("hash", &self.hash)
            .field("len", &self.entries.len())
            .finish()
    }
}

impl PartialEq for LegacyMap {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for LegacyMap {}

pub struct LegacyMapEditor {
    entries: BTreeMap<LegacyTuple, LegacyTuple>,
}

impl LegacyMapEditor {
    pub fn put(&mut self, key: LegacyTuple, value: LegacyTuple) -> &mut Self {
        self.entries.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &LegacyTuple) -> &mut Self {
        self.entries.remove(key);
        self
    }

    pub fn finish(self) -> LegacyMap {
        LegacyMap::from_btree(self.entries)
    }
}
