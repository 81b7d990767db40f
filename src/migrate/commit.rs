//! Commit and working-set migration.

use super::root::migrate_root;
use super::schema::validate_root_value;
use super::{CancelToken, MigrateError, MigrateOptions};
use crate::Error;
use crate::core::{ContentHash, RefName, WorkingSet};
use crate::legacy::{LegacyCommit, LegacyRoot, LegacyStore};
use crate::progress::Progress;
use crate::store::{Commit, DestStore, RootValue};

/// What `migrate_commit` did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Already in the ledger; nothing was read or written.
    Skipped { migrated: ContentHash },
    Migrated { migrated: ContentHash },
}

impl CommitOutcome {
    pub fn migrated(&self) -> ContentHash {
        match self {
            CommitOutcome::Skipped { migrated } | CommitOutcome::Migrated { migrated } => {
                *migrated
            }
        }
    }
}

/// Migrates commits one at a time from a legacy store into a destination
/// store, recording each in the progress ledger.
///
/// The caller walks the history and must hand over parents before children.
pub struct Migrator<'a> {
    legacy: &'a dyn LegacyStore,
    dest: &'a dyn DestStore,
    progress: &'a dyn Progress,
    options: MigrateOptions,
    cancel: CancelToken,
}

impl<'a> Migrator<'a> {
    pub fn new(
        legacy: &'a dyn LegacyStore,
        dest: &'a dyn DestStore,
        progress: &'a dyn Progress,
    ) -> Self {
        Self {
            legacy,
            dest,
            progress,
            options: MigrateOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_options(mut self, options: MigrateOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &MigrateOptions {
        &self.options
    }

    /// Token that aborts in-flight migrations when cancelled.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn migrate_commit(&self, commit: &LegacyCommit) -> Result<CommitOutcome, Error> {
        let span = tracing::info_span!("migrate_commit", commit = %commit.hash.short());
        let _guard = span.enter();

        if self.progress.has(&commit.hash)? {
            let migrated = self.progress.get(&commit.hash)?;
            tracing::debug!(migrated = %migrated.short(), "already migrated");
            return Ok(CommitOutcome::Skipped { migrated });
        }
        if commit.is_root() {
            return self.migrate_init_commit(commit);
        }

        self.progress
            .log(format_args!("migrating commit {}", commit.hash));
        // Every parent must be migrated before anything is written.
        let parents = commit
            .parents
            .iter()
            .map(|parent| self.mapped_parent(commit, parent))
            .collect::<Result<Vec<_>, _>>()?;
        let migrated_parent_hash = parents[0];

        let legacy_root = self.legacy.commit_root(commit)?;
        let legacy_parent_root = self.legacy.parent_root(commit, 0)?;
        let migrated_parent = self.dest.read_commit(&migrated_parent_hash)?;
        let migrated_parent_root = self.dest.commit_root(&migrated_parent)?;

        let root = migrate_root(
            &legacy_parent_root,
            &legacy_root,
            &migrated_parent_root,
            &self.options,
            &self.cancel,
        )?;
        let root_hash = self.dest.write_root_value(&root)?;
        let root = self.dest.read_root_value(&root_hash)?;

        let migrated = Commit::dangling(root_hash, parents, commit.meta.clone());
        self.dest.write_commit(&migrated)?;
        self.dest.set_head(&self.options.flush_ref, migrated.hash)?;

        // After the flush, so a failing commit's output can be inspected.
        validate_root_value(&legacy_root, &root, self.options.validation)?;

        self.progress.put(commit.hash, migrated.hash)?;
        tracing::info!(
            migrated = %migrated.hash.short(),
            tables = root.table_names().count(),
            "commit migrated"
        );
        Ok(CommitOutcome::Migrated {
            migrated: migrated.hash,
        })
    }

    fn migrate_init_commit(&self, commit: &LegacyCommit) -> Result<CommitOutcome, Error> {
        self.progress
            .log(format_args!("migrating init commit {}", commit.hash));
        let root_hash = self.dest.write_root_value(&RootValue::empty())?;
        let migrated = Commit::dangling(root_hash, Vec::new(), commit.meta.clone());
        self.dest.write_commit(&migrated)?;
        self.dest.set_head(&self.options.creation_ref, migrated.hash)?;
        self.progress.put(commit.hash, migrated.hash)?;
        tracing::info!(migrated = %migrated.hash.short(), "init commit migrated");
        Ok(CommitOutcome::Migrated {
            migrated: migrated.hash,
        })
    }

    fn mapped_parent(
        &self,
        commit: &LegacyCommit,
        parent: &ContentHash,
    ) -> Result<ContentHash, Error> {
        if !self.progress.has(parent)? {
            return Err(MigrateError::Ordering {
                commit: commit.hash,
                parent: *parent,
            }
            .into());
        }
        Ok(self.progress.get(parent)?)
    }

    /// Migrates the working set of `branch` stored under `working_set`.
    ///
    /// Working and staged roots are migrated against the branch head, which
    /// must already be migrated and pointed at by `branch` in the destination.
    /// A root identical to the legacy head maps to the migrated head root.
    pub fn migrate_working_set(
        &self,
        branch: &RefName,
        working_set: &RefName,
    ) -> Result<WorkingSet<ContentHash>, Error> {
        let span = tracing::info_span!("migrate_working_set", working_set = %working_set);
        let _guard = span.enter();

        let legacy_ws = self.legacy.resolve_working_set(working_set)?;
        let legacy_head = self.legacy.read_commit(&self.legacy.resolve_ref(branch)?)?;
        let legacy_head_root = self.legacy.commit_root(&legacy_head)?;

        let migrated_head = self.dest.read_commit(&self.dest.resolve_ref(branch)?)?;
        let migrated_head_root = self.dest.commit_root(&migrated_head)?;

        let head_hash = legacy_head_root.hash();
        let migrate = |root: &LegacyRoot| -> Result<ContentHash, Error> {
            // Clean working sets keep the migrated head root as is.
            if root.hash() == head_hash {
                return Ok(migrated_head.root);
            }
            let migrated = migrate_root(
                &legacy_head_root,
                root,
                &migrated_head_root,
                &self.options,
                &self.cancel,
            )?;
            let hash = self.dest.write_root_value(&migrated)?;
            validate_root_value(root, &migrated, self.options.validation)?;
            Ok(hash)
        };
        let working = migrate(legacy_ws.working.as_ref())?;
        let staged = migrate(legacy_ws.staged.as_ref())?;

        let migrated = WorkingSet {
            working,
            staged,
            meta: legacy_ws.meta.clone(),
        };
        self.dest.update_working_set(working_set, migrated.clone())?;
        self.progress
            .log(format_args!("migrated working set {working_set}"));
        Ok(migrated)
    }
}
