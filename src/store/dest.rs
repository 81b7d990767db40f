//! Write side: the destination store the migrator persists into.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::commit::Commit;
use super::error::StoreError;
use super::table::RootValue;
use crate::core::{ContentHash, RefName, WorkingSet};

pub trait DestStore: Send + Sync {
    /// Persists `root` and returns its address.
    fn write_root_value(&self, root: &RootValue) -> Result<ContentHash, StoreError>;

    fn read_root_value(&self, hash: &ContentHash) -> Result<Arc<RootValue>, StoreError>;

    fn write_commit(&self, commit: &Commit) -> Result<(), StoreError>;

    fn read_commit(&self, hash: &ContentHash) -> Result<Commit, StoreError>;

    /// Points `name` at `commit`. Every write made before this call is
    /// durable once it returns.
    fn set_head(&self, name: &RefName, commit: ContentHash) -> Result<(), StoreError>;

    fn resolve_ref(&self, name: &RefName) -> Result<ContentHash, StoreError>;

    fn update_working_set(
        &self,
        name: &RefName,
        working_set: WorkingSet<ContentHash>,
    ) -> Result<(), StoreError>;

    fn working_set(&self, name: &RefName) -> Result<WorkingSet<ContentHash>, StoreError>;

    fn commit_root(&self, commit: &Commit) -> Result<Arc<RootValue>, StoreError> {
        self.read_root_value(&commit.root)
    }
}

#[derive(Default)]
struct MemoryDestState {
    roots: BTreeMap<ContentHash, Arc<RootValue>>,
    commits: BTreeMap<ContentHash, Commit>,
    refs: BTreeMap<RefName, ContentHash>,
    working_sets: BTreeMap<RefName, WorkingSet<ContentHash>>,
    unflushed: usize,
    flushes: u64,
}

/// In-memory destination store.
///
/// Tracks how many writes are waiting for the next `set_head` so callers can
/// check that nothing is recorded as done before it was flushed.
#[derive(Clone, Default)]
pub struct MemoryDestStore {
    state: Arc<RwLock<MemoryDestState>>,
}

impl MemoryDestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes not yet covered by a `set_head`.
    pub fn unflushed(&self) -> usize {
        self.state.read().map(|s| s.unflushed).unwrap_or(0)
    }

    pub fn flush_count(&self) -> u64 {
        self.state.read().map(|s| s.flushes).unwrap_or(0)
    }

    pub fn commit_count(&self) -> usize {
        self.state.read().map(|s| s.commits.len()).unwrap_or(0)
    }
}

impl DestStore for MemoryDestStore {
    fn write_root_value(&self, root: &RootValue) -> Result<ContentHash, StoreError> {
        let hash = root.hash();
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.roots.entry(hash).or_insert_with(|| Arc::new(root.clone()));
        state.unflushed += 1;
        Ok(hash)
    }

    fn read_root_value(&self, hash: &ContentHash) -> Result<Arc<RootValue>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .roots
            .get(hash)
            .cloned()
            .ok_or(StoreError::RootNotFound(*hash))
    }

    fn write_commit(&self, commit: &Commit) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.roots.contains_key(&commit.root) {
            return Err(StoreError::RootNotFound(commit.root));
        }
        state.commits.insert(commit.hash, commit.clone());
        state.unflushed += 1;
        Ok(())
    }

    fn read_commit(&self, hash: &ContentHash) -> Result<Commit, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .commits
            .get(hash)
            .cloned()
            .ok_or(StoreError::CommitNotFound(*hash))
    }

    fn set_head(&self, name: &RefName, commit: ContentHash) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        if !state.commits.contains_key(&commit) {
            return Err(StoreError::CommitNotFound(commit));
        }
        state.refs.insert(name.clone(), commit);
        state.unflushed = 0;
        state.flushes += 1;
        Ok(())
    }

    fn resolve_ref(&self, name: &RefName) -> Result<ContentHash, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .refs
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::RefNotFound(name.clone()))
    }

    fn update_working_set(
        &self,
        name: &RefName,
        working_set: WorkingSet<ContentHash>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        for root in [&working_set.working, &working_set.staged] {
            if !state.roots.contains_key(root) {
                return Err(StoreError::RootNotFound(*root));
            }
        }
        state.working_sets.insert(name.clone(), working_set);
        state.unflushed = 0;
        state.flushes += 1;
        Ok(())
    }

    fn working_set(&self, name: &RefName) -> Result<WorkingSet<ContentHash>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .working_sets
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::WorkingSetNotFound(name.clone()))
    }
}

fn poisoned() -> StoreError {
    StoreError::Poisoned("destination")
}
