use crate::core::{CommitMeta, ContentHash, commit_address};

/// Destination commit object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Commit {
    pub hash: ContentHash,
    pub parents: Vec<ContentHash>,
    pub root: ContentHash,
    pub meta: CommitMeta,
}

impl Commit {
    /// Builds a commit that no ref points at yet. Pure: nothing is written
    /// until the commit is handed to a store.
    pub fn dangling(root: ContentHash, parents: Vec<ContentHash>, meta: CommitMeta) -> Self {
        Self {
            hash: commit_address(&root, &parents, &meta),
            parents,
            root,
            meta,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parents.is_empty()
    }
}
