//! Table migration: the primary row map and every secondary index.

use super::{CancelToken, IndexSide, MigrateError, MigrateOptions, TaskGroup, Unsupported};
use crate::Error;
use crate::core::Schema;
use crate::legacy::LegacyTable;
use crate::store::{IndexSet, Table};

/// Migrates `legacy_table` onto `migrated_baseline`.
///
/// `legacy_baseline` and `migrated_baseline` must hold the same rows (both
/// the parent's, or both empty). Rows and the index set are rebuilt
/// concurrently; a failure in either cancels the other.
pub fn migrate_table(
    name: &str,
    schema: &Schema,
    legacy_baseline: &LegacyTable,
    legacy_table: &LegacyTable,
    migrated_baseline: &Table,
    options: &MigrateOptions,
    cancel: &CancelToken,
) -> Result<Table, Error> {
    std::thread::scope(|scope| {
        let group = TaskGroup::new(scope, cancel);
        let rows = group.spawn("migrate-rows", |token| {
            options.pipeline.migrate_index(
                &schema.row_layout(),
                legacy_baseline.rows(),
                legacy_table.rows(),
                migrated_baseline.rows(),
                token,
            )
        })?;
        let indexes = group.spawn("migrate-indexes", |token| {
            migrate_index_set(
                name,
                schema,
                legacy_baseline,
                legacy_table,
                migrated_baseline,
                options,
                token,
            )
        })?;

        let rows = group.join(rows);
        let indexes = group.join(indexes);
        group.finish()?;
        Ok(Table::new(
            schema.clone(),
            rows?,
            indexes?,
            legacy_table.auto_increment(),
        ))
    })
}

fn migrate_index_set(
    name: &str,
    schema: &Schema,
    legacy_baseline: &LegacyTable,
    legacy_table: &LegacyTable,
    migrated_baseline: &Table,
    options: &MigrateOptions,
    cancel: &CancelToken,
) -> Result<IndexSet, Error> {
    let missing = |index: &str, side: IndexSide| {
        MigrateError::from(Unsupported::MissingIndex {
            table: name.to_string(),
            index: index.to_string(),
            side,
        })
    };
    let mut set = IndexSet::new();
    for def in &schema.indexes {
        let legacy_base = legacy_baseline
            .index(&def.name)
            .ok_or_else(|| missing(&def.name, IndexSide::LegacyBaseline))?;
        let legacy = legacy_table
            .index(&def.name)
            .ok_or_else(|| missing(&def.name, IndexSide::Legacy))?;
        let migrated_base = migrated_baseline
            .indexes()
            .get_index(&def.name)
            .ok_or_else(|| missing(&def.name, IndexSide::MigratedBaseline))?;

        let map = options.pipeline.migrate_index(
            &schema.index_layout(def),
            legacy_base,
            legacy,
            migrated_base,
            cancel,
        )?;
        tracing::trace!(table = name, index = %def.name, rows = map.len(), "index migrated");
        set = set.put_index(def.name.clone(), map);
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::core::{Column, ColumnKind, IndexDef, LegacyTuple, Value};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", 1, ColumnKind::Int, true),
            Column::new("email", 2, ColumnKind::String, false),
        ])
        .with_index(IndexDef::new("by_email", vec![2]).unique())
    }

    fn rows(n: i64) -> impl Iterator<Item = (LegacyTuple, LegacyTuple)> {
        (0..n).map(|i| {
            (
                LegacyTuple::new([(1, Value::Int(i))]),
                LegacyTuple::sparse([(2, Value::from(format!("u{i}@x")))]),
            )
        })
    }

    #[test]
    fn migrates_rows_indexes_and_auto_increment() {
        let schema = schema();
        let legacy = LegacyTable::from_rows(schema.clone(), rows(5)).with_auto_increment(6);
        let table = migrate_table(
            "users",
            &schema,
            &LegacyTable::empty(&schema),
            &legacy,
            &Table::empty(&schema),
            &MigrateOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(table.rows().len(), 5);
        assert_eq!(table.indexes().get_index("by_email").unwrap().len(), 5);
        assert_eq!(table.auto_increment(), 6);
    }

    #[test]
    fn missing_index_names_the_side() {
        let schema = schema();
        let legacy =
            LegacyTable::from_rows(schema.clone(), rows(2)).with_index_map("by_email", None);
        let err = migrate_table(
            "users",
            &schema,
            &LegacyTable::empty(&schema),
            &legacy,
            &Table::empty(&schema),
            &MigrateOptions::default(),
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedData);
        assert!(matches!(
            err,
            Error::Migrate(MigrateError::Unsupported(Unsupported::MissingIndex {
                side: IndexSide::Legacy,
                ..
            }))
        ));
    }

    #[test]
    fn bad_row_fails_table_and_cancels_index_work() {
        let schema = schema();
        let mut entries: Vec<_> = rows(300).collect();
        entries[10].1 = LegacyTuple::sparse([(2, Value::Int(1))]);
        let legacy = LegacyTable::from_rows(schema.clone(), entries);
        let options = MigrateOptions {
            pipeline: crate::migrate::Pipeline::new(1),
            ..MigrateOptions::default()
        };
        let err = migrate_table(
            "users",
            &schema,
            &LegacyTable::empty(&schema),
            &legacy,
            &Table::empty(&schema),
            &options,
            &CancelToken::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedData);
    }
}
