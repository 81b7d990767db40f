//! Read side of the legacy store.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::table::LegacyRoot;
use crate::core::{CommitMeta, ContentHash, RefName, WorkingSet, commit_address};
use crate::store::StoreError;

/// Immutable legacy commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyCommit {
    pub hash: ContentHash,
    pub parents: Vec<ContentHash>,
    pub root: ContentHash,
    pub meta: CommitMeta,
}

impl LegacyCommit {
    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}

/// What the migrator needs from a legacy store. Everything is read-only.
pub trait LegacyStore: Send + Sync {
    fn read_commit(&self, hash: &ContentHash) -> Result<LegacyCommit, StoreError>;

    /// Commit a branch ref currently points at.
    fn resolve_ref(&self, name: &RefName) -> Result<ContentHash, StoreError>;

    fn read_root(&self, hash: &ContentHash) -> Result<Arc<LegacyRoot>, StoreError>;

    fn resolve_working_set(
        &self,
        name: &RefName,
    ) -> Result<WorkingSet<Arc<LegacyRoot>>, StoreError>;

    /// Root snapshot of `commit`.
    fn commit_root(&self, commit: &LegacyCommit) -> Result<Arc<LegacyRoot>, StoreError> {
        self.read_root(&commit.root)
    }

    /// Root snapshot of the `index`th parent of `commit`.
    fn parent_root(
        &self,
        commit: &LegacyCommit,
        index: usize,
    ) -> Result<Arc<LegacyRoot>, StoreError> {
        let parent = commit.parents.get(index).ok_or(StoreError::NoParent {
            commit: commit.hash,
            index,
        })?;
        let parent = self.read_commit(parent)?;
        self.commit_root(&parent)
    }
}

#[derive(Default)]
struct MemoryLegacyState {
    commits: BTreeMap<ContentHash, LegacyCommit>,
    roots: BTreeMap<ContentHash, Arc<LegacyRoot>>,
    refs: BTreeMap<RefName, ContentHash>,
    working_sets: BTreeMap<RefName, WorkingSet<Arc<LegacyRoot>>>,
}

/// In-memory legacy store, used to build histories for tests and dry runs.
#[derive(Clone, Default)]
pub struct MemoryLegacyStore {
    state: Arc<RwLock<MemoryLegacyState>>,
}

impl MemoryLegacyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `root` and a commit over it, returning the new commit.
    pub fn commit(
        &self,
        parents: &[ContentHash],
        root: LegacyRoot,
        meta: CommitMeta,
    ) -> Result<LegacyCommit, StoreError> {
        let root_hash = root.hash();
        let commit = LegacyCommit {
            hash: commit_address(&root_hash, parents, &meta),
            parents: parents.to_vec(),
            root: root_hash,
            meta,
        };
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.roots.insert(root_hash, Arc::new(root));
        state.commits.insert(commit.hash, commit.clone());
        Ok(commit)
    }

    pub fn set_ref(&self, name: RefName, commit: ContentHash) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.refs.insert(name, commit);
        Ok(())
    }

    pub fn put_working_set(
        &self,
        name: RefName,
        working_set: WorkingSet<LegacyRoot>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let working_set = WorkingSet {
            working: Arc::new(working_set.working),
            staged: Arc::new(working_set.staged),
            meta: working_set.meta,
        };
        state.working_sets.insert(name, working_set);
        Ok(())
    }
}

impl LegacyStore for MemoryLegacyStore {
    fn read_commit(&self, hash: &ContentHash) -> Result<LegacyCommit, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .commits
            .get(hash)
            .cloned()
            .ok_or(StoreError::CommitNotFound(*hash))
    }

    fn resolve_ref(&self, name: &RefName) -> Result<ContentHash, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .refs
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::RefNotFound(name.clone()))
    }

    fn read_root(&self, hash: &ContentHash) -> Result<Arc<LegacyRoot>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .roots
            .get(hash)
            .cloned()
            .ok_or(StoreError::RootNotFound(*hash))
    }

    fn resolve_working_set(
        &self,
        name: &RefName,
    ) -> Result<WorkingSet<Arc<LegacyRoot>>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .working_sets
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::WorkingSetNotFound(name.clone()))
    }
}

fn poisoned() -> StoreError {
    StoreError::Poisoned("legacy")
}
