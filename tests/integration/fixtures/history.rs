#![allow(dead_code)]

use std::collections::BTreeMap;

use format_migrate::core::{
    Column, ColumnKind, CommitMeta, ContentHash, IndexDef, LegacyTuple, Schema, SqlType, Value,
};
use format_migrate::legacy::{LegacyCommit, LegacyRoot, LegacyTable, MemoryLegacyStore};
use format_migrate::progress::Progress;
use format_migrate::store::{DestStore, MemoryDestStore, RootValue};
use format_migrate::{MigrateOptions, Migrator};

pub type Rows = BTreeMap<i64, (String, i64)>;

pub fn meta(description: &str) -> CommitMeta {
    CommitMeta::new("fixture", "fixture@example.com", 1_700_000_000_000, description)
}

/// `users(id pk, email, score)` with a unique index on email.
pub fn users_schema() -> Schema {
    Schema::new(vec![
        Column::new("id", 1, ColumnKind::Int, true),
        Column::new("email", 2, ColumnKind::String, false),
        Column::new("score", 3, ColumnKind::Int, false),
    ])
    .with_index(IndexDef::new("by_email", vec![2]).unique())
}

/// Same columns, but `email` declared as a bounded varchar.
pub fn users_schema_v2() -> Schema {
    Schema::new(vec![
        Column::new("id", 1, ColumnKind::Int, true),
        Column::new("email", 2, ColumnKind::String, false).with_sql_type(SqlType::Varchar(64)),
        Column::new("score", 3, ColumnKind::Int, false),
    ])
    .with_index(IndexDef::new("by_email", vec![2]).unique())
}

pub fn users(n: i64) -> Rows {
    (0..n).map(|i| (i, (format!("user{i}@example.com"), i * 7))).collect()
}

pub fn users_table(schema: &Schema, rows: &Rows) -> LegacyTable {
    LegacyTable::from_rows(
        schema.clone(),
        rows.iter().map(|(id, (email, score))| {
            (
                LegacyTuple::new([(1, Value::Int(*id))]),
                LegacyTuple::sparse([
                    (2, Value::from(email.clone())),
                    (3, Value::Int(*score)),
                ]),
            )
        }),
    )
}

pub fn root_with(tables: impl IntoIterator<Item = (&'static str, LegacyTable)>) -> LegacyRoot {
    tables
        .into_iter()
        .fold(LegacyRoot::empty(), |root, (name, table)| root.put_table(name, table))
}

/// A legacy store plus the destination and ledger a migration writes into.
pub struct Rig<P> {
    pub legacy: MemoryLegacyStore,
    pub dest: MemoryDestStore,
    pub progress: P,
}

impl<P: Progress> Rig<P> {
    pub fn new(progress: P) -> Self {
        Self {
            legacy: MemoryLegacyStore::new(),
            dest: MemoryDestStore::new(),
            progress,
        }
    }

    pub fn commit(&self, parents: &[ContentHash], root: LegacyRoot, msg: &str) -> LegacyCommit {
        self.legacy
            .commit(parents, root, meta(msg))
            .expect("legacy commit")
    }

    pub fn migrator(&self) -> Migrator<'_> {
        Migrator::new(&self.legacy, &self.dest, &self.progress)
    }

    pub fn migrator_with(&self, options: MigrateOptions) -> Migrator<'_> {
        self.migrator().with_options(options)
    }

    pub fn migrated_root(&self, legacy: &LegacyCommit) -> std::sync::Arc<RootValue> {
        let migrated = self.progress.get(&legacy.hash).expect("ledger entry");
        let commit = self.dest.read_commit(&migrated).expect("migrated commit");
        self.dest.commit_root(&commit).expect("migrated root")
    }
}
