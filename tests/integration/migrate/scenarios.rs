use std::sync::Arc;

use format_migrate::core::{ContentHash, LegacyTuple, Value};
use format_migrate::legacy::{LegacyRoot, LegacyStore, LegacyTable};
use format_migrate::migrate::{Pipeline, migrate_root};
use format_migrate::progress::Progress;
use format_migrate::store::{
    Commit, DestStore, MemoryDestStore, RootValue, StoreError, Table, TupleMap,
};
use format_migrate::{
    CancelToken, CommitOutcome, ErrorKind, MemoryProgress, MigrateOptions, Migrator, RefName,
    WorkingSet,
};

use crate::fixtures::history::{
    Rig, root_with, users, users_schema, users_schema_v2, users_table,
};

fn rig() -> Rig<MemoryProgress> {
    Rig::new(MemoryProgress::new())
}

/// Destination that loses every table's rows when a root is read back.
struct RowDroppingDest {
    inner: MemoryDestStore,
}

impl DestStore for RowDroppingDest {
    fn write_root_value(&self, root: &RootValue) -> Result<ContentHash, StoreError> {
        self.inner.write_root_value(root)
    }

    fn read_root_value(&self, hash: &ContentHash) -> Result<Arc<RootValue>, StoreError> {
        let root = self.inner.read_root_value(hash)?;
        let damaged = root.tables().fold((*root).clone(), |acc, (name, table)| {
            let emptied = Table::new(
                table.schema().clone(),
                TupleMap::empty(),
                table.indexes().clone(),
                table.auto_increment(),
            );
            acc.put_table(name, emptied)
        });
        Ok(Arc::new(damaged))
    }

    fn write_commit(&self, commit: &Commit) -> Result<(), StoreError> {
        self.inner.write_commit(commit)
    }

    fn read_commit(&self, hash: &ContentHash) -> Result<Commit, StoreError> {
        self.inner.read_commit(hash)
    }

    fn set_head(&self, name: &RefName, commit: ContentHash) -> Result<(), StoreError> {
        self.inner.set_head(name, commit)
    }

    fn resolve_ref(&self, name: &RefName) -> Result<ContentHash, StoreError> {
        self.inner.resolve_ref(name)
    }

    fn update_working_set(
        &self,
        name: &RefName,
        working_set: WorkingSet<ContentHash>,
    ) -> Result<(), StoreError> {
        self.inner.update_working_set(name, working_set)
    }

    fn working_set(&self, name: &RefName) -> Result<WorkingSet<ContentHash>, StoreError> {
        self.inner.working_set(name)
    }
}

/// Migrates `root` with nothing to diff against.
fn full_migration(root: &LegacyRoot) -> RootValue {
    migrate_root(
        &LegacyRoot::empty(),
        root,
        &RootValue::empty(),
        &MigrateOptions::default(),
        &CancelToken::new(),
    )
    .expect("full migration")
}

#[test]
fn root_commit_with_empty_table() {
    let rig = rig();
    let init = rig.commit(
        &[],
        root_with([("users", users_table(&users_schema(), &users(0)))]),
        "init",
    );
    let branch = RefName::branch("main");
    let ws_ref = RefName::working_set("main");
    rig.legacy.set_ref(branch.clone(), init.hash).unwrap();
    let head_root = rig.legacy.read_root(&init.root).unwrap();
    rig.legacy
        .put_working_set(
            ws_ref.clone(),
            WorkingSet {
                working: (*head_root).clone(),
                staged: (*head_root).clone(),
                meta: None,
            },
        )
        .unwrap();

    let migrator = rig.migrator();
    let migrated = migrator.migrate_commit(&init).unwrap().migrated();
    assert_eq!(rig.progress.get(&init.hash).unwrap(), migrated);
    let root = rig.migrated_root(&init);
    assert!(root.tables().all(|(_, table)| table.rows().is_empty()));

    rig.dest.set_head(&branch, migrated).unwrap();
    let ws = migrator.migrate_working_set(&branch, &ws_ref).unwrap();
    assert_eq!(ws.working, root.hash());
    assert_eq!(ws.staged, root.hash());
}

#[test]
fn child_commit_adds_rows_on_top_of_parent() {
    let rig = rig();
    let schema = users_schema();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let base_rows = users(5);
    let base = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&schema, &base_rows))]),
        "base",
    );
    let mut child_rows = base_rows.clone();
    for id in 100..103 {
        child_rows.insert(id, (format!("new{id}@example.com"), id));
    }
    let child_root = root_with([("users", users_table(&schema, &child_rows))]);
    let child = rig.commit(&[base.hash], child_root.clone(), "three rows");

    let migrator = rig.migrator();
    for commit in [&init, &base, &child] {
        migrator.migrate_commit(commit).unwrap();
    }

    let base_root = rig.migrated_root(&base);
    let migrated = rig.migrated_root(&child);
    let table = migrated.get_table("users").unwrap();
    assert_eq!(table.rows().len(), base_rows.len() + 3);
    assert_eq!(table.indexes().get_index("by_email").unwrap().len(), 8);

    let parent_table = base_root.get_table("users").unwrap();
    for (key, value) in parent_table.rows().iter() {
        assert_eq!(table.rows().get(key), Some(value));
    }
    assert_eq!(parent_table.rows().len(), base_rows.len());
    assert_eq!(*migrated, full_migration(&child_root));
}

#[test]
fn schema_change_rebuilds_table() {
    let rig = rig();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let base = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&users_schema(), &users(20)))]),
        "base",
    );
    let mut rows = users(20);
    rows.remove(&3);
    rows.insert(50, ("late@example.com".into(), 1));
    let child_root = root_with([("users", users_table(&users_schema_v2(), &rows))]);
    let child = rig.commit(&[base.hash], child_root.clone(), "alter email");

    let migrator = rig.migrator();
    for commit in [&init, &base, &child] {
        migrator.migrate_commit(commit).unwrap();
    }

    let migrated = rig.migrated_root(&child);
    assert_eq!(*migrated, full_migration(&child_root));
    let table = migrated.get_table("users").unwrap();
    assert_eq!(table.rows().len(), 20);
    assert_eq!(table.schema(), &users_schema_v2());
}

#[test]
fn conflicted_table_is_rejected_without_ledger_entry() {
    let rig = rig();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let conflicted = users_table(&users_schema(), &users(3)).with_conflicts(1);
    let child = rig.commit(&[init.hash], root_with([("users", conflicted)]), "conflict");

    let migrator = rig.migrator();
    migrator.migrate_commit(&init).unwrap();
    let commits = rig.dest.commit_count();
    let err = migrator.migrate_commit(&child).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedData);
    assert!(!rig.progress.has(&child.hash).unwrap());
    assert_eq!(rig.dest.commit_count(), commits);
}

#[test]
fn merge_commit_maps_every_parent() {
    let rig = rig();
    let schema = users_schema();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let left = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&schema, &users(2)))]),
        "left",
    );
    let right = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&schema, &users(4)))]),
        "right",
    );
    let merge = rig.commit(
        &[left.hash, right.hash],
        root_with([("users", users_table(&schema, &users(4)))]),
        "merge",
    );

    let migrator = rig.migrator();
    for commit in [&init, &left, &right, &merge] {
        migrator.migrate_commit(commit).unwrap();
    }

    let migrated = rig
        .dest
        .read_commit(&rig.progress.get(&merge.hash).unwrap())
        .unwrap();
    assert_eq!(
        migrated.parents,
        vec![
            rig.progress.get(&left.hash).unwrap(),
            rig.progress.get(&right.hash).unwrap(),
        ]
    );
    assert_eq!(migrated.meta, merge.meta);
}

#[test]
fn merge_with_unmigrated_second_parent_is_an_ordering_error() {
    let rig = rig();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let left = rig.commit(&[init.hash], LegacyRoot::empty(), "left");
    let right = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&users_schema(), &users(1)))]),
        "right",
    );
    let merge = rig.commit(&[left.hash, right.hash], LegacyRoot::empty(), "merge");

    let migrator = rig.migrator();
    migrator.migrate_commit(&init).unwrap();
    migrator.migrate_commit(&left).unwrap();
    let flushes = rig.dest.flush_count();
    let commits = rig.dest.commit_count();

    let err = migrator.migrate_commit(&merge).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Ordering);
    assert!(!rig.progress.has(&merge.hash).unwrap());
    // Rejected before any root or commit was written.
    assert_eq!(rig.dest.unflushed(), 0);
    assert_eq!(rig.dest.flush_count(), flushes);
    assert_eq!(rig.dest.commit_count(), commits);
}

#[test]
fn damaged_readback_fails_validation_after_flush() {
    let rig = rig();
    let dest = RowDroppingDest {
        inner: MemoryDestStore::new(),
    };
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let child = rig.commit(
        &[init.hash],
        root_with([("users", users_table(&users_schema(), &users(4)))]),
        "four users",
    );

    let migrator = Migrator::new(&rig.legacy, &dest, &rig.progress);
    migrator.migrate_commit(&init).unwrap();
    let err = migrator.migrate_commit(&child).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
    assert!(!rig.progress.has(&child.hash).unwrap());

    // The failing commit stays flushed and reachable for inspection.
    let head = dest.resolve_ref(&migrator.options().flush_ref).unwrap();
    let flushed = dest.read_commit(&head).unwrap();
    assert_eq!(flushed.meta, child.meta);
    assert_eq!(flushed.parents, vec![rig.progress.get(&init.hash).unwrap()]);
    assert_eq!(dest.inner.unflushed(), 0);
}

#[test]
fn translator_failure_aborts_commit() {
    let rig = rig();
    let schema = users_schema();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let mut entries: Vec<_> = users(400)
        .into_iter()
        .map(|(id, (email, score))| {
            (
                LegacyTuple::new([(1, Value::Int(id))]),
                LegacyTuple::sparse([(2, Value::from(email)), (3, Value::Int(score))]),
            )
        })
        .collect();
    entries[7].1 = LegacyTuple::sparse([(2, Value::from("x@y")), (3, Value::from("NaN"))]);
    let table = LegacyTable::from_rows(schema, entries);
    let child = rig.commit(&[init.hash], root_with([("users", table)]), "bad row");

    let migrator = rig.migrator_with(MigrateOptions {
        pipeline: Pipeline::new(1),
        ..MigrateOptions::default()
    });
    migrator.migrate_commit(&init).unwrap();
    let commits = rig.dest.commit_count();
    let err = migrator.migrate_commit(&child).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::UnsupportedData);
    assert!(!err.is_cancelled());
    assert!(!rig.progress.has(&child.hash).unwrap());
    assert_eq!(rig.dest.commit_count(), commits);
}

#[test]
fn dropped_table_disappears_from_child() {
    let rig = rig();
    let schema = users_schema();
    let init = rig.commit(&[], LegacyRoot::empty(), "init");
    let base = rig.commit(
        &[init.hash],
        root_with([
            ("users", users_table(&schema, &users(3))),
            ("archive", users_table(&schema, &users(2))),
        ]),
        "two tables",
    );
    let child = rig.commit(
        &[base.hash],
        root_with([("users", users_table(&schema, &users(3)))]),
        "drop archive",
    );

    let migrator = rig.migrator();
    for commit in [&init, &base, &child] {
        migrator.migrate_commit(commit).unwrap();
    }
    let migrated = rig.migrated_root(&child);
    assert_eq!(migrated.table_names().collect::<Vec<_>>(), vec!["users"]);
    assert!(rig.migrated_root(&base).get_table("archive").is_some());
}

#[test]
fn migration_is_idempotent_and_deterministic() {
    let build = |rig: &Rig<MemoryProgress>| {
        let init = rig.commit(&[], LegacyRoot::empty(), "init");
        let child = rig.commit(
            &[init.hash],
            root_with([("users", users_table(&users_schema(), &users(10)))]),
            "rows",
        );
        vec![init, child]
    };

    let first = rig();
    let history = build(&first);
    let migrator = first.migrator();
    let outcomes: Vec<_> = history
        .iter()
        .map(|c| migrator.migrate_commit(c).unwrap())
        .collect();
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, CommitOutcome::Migrated { .. }))
    );

    let commits = first.dest.commit_count();
    for (commit, outcome) in history.iter().zip(&outcomes) {
        let again = migrator.migrate_commit(commit).unwrap();
        assert_eq!(
            again,
            CommitOutcome::Skipped {
                migrated: outcome.migrated()
            }
        );
    }
    assert_eq!(first.dest.commit_count(), commits);

    let second = rig();
    let replay = build(&second);
    let migrator = second.migrator();
    for (commit, outcome) in replay.iter().zip(&outcomes) {
        assert_eq!(
            migrator.migrate_commit(commit).unwrap().migrated(),
            outcome.migrated()
        );
    }
}
