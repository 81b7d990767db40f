//! Root reconciliation: decides per table between an incremental migration
//! against the parent and a full rebuild.

use std::borrow::Cow;
use std::sync::Arc;

use super::schema::{patch_legacy_schema, validate_schema};
use super::table::migrate_table;
use super::{CancelToken, MigrateError, MigrateOptions, Unsupported};
use crate::Error;
use crate::core::Schema;
use crate::legacy::{LegacyRoot, LegacyTable};
use crate::store::{RootValue, Table};

/// Anything that carries a schema and can stand in as a diff baseline.
pub trait Baseline {
    fn schema(&self) -> &Schema;
}

impl Baseline for LegacyTable {
    fn schema(&self) -> &Schema {
        LegacyTable::schema(self)
    }
}

impl Baseline for Table {
    fn schema(&self) -> &Schema {
        Table::schema(self)
    }
}

/// The parent's table, if it can serve as a baseline for `schema`.
///
/// A missing table or any schema difference rules the candidate out: its
/// rows were encoded for another layout and diffing against them would
/// produce edits for the wrong tuples.
pub fn reusable_baseline<'a, T: Baseline>(
    schema: &Schema,
    candidate: Option<&'a Arc<T>>,
) -> Option<&'a Arc<T>> {
    candidate.filter(|table| table.schema() == schema)
}

/// Migrates every table of `legacy_root` on top of `migrated_parent`.
///
/// `legacy_parent` must be the legacy root `migrated_parent` was produced
/// from. Tables missing from `legacy_root` are dropped from the result.
pub fn migrate_root(
    legacy_parent: &LegacyRoot,
    legacy_root: &LegacyRoot,
    migrated_parent: &RootValue,
    options: &MigrateOptions,
    cancel: &CancelToken,
) -> Result<RootValue, Error> {
    let mut migrated = migrated_parent
        .clone()
        .with_foreign_keys(legacy_root.foreign_keys().clone());

    let dropped: Vec<&str> = migrated_parent
        .table_names()
        .filter(|name| legacy_root.get_table(name).is_none())
        .collect();
    for name in dropped {
        tracing::debug!(table = name, "table dropped");
        migrated = migrated.remove_table(name);
    }

    for (name, table) in legacy_root.tables() {
        if cancel.is_cancelled() {
            return Err(MigrateError::Cancelled.into());
        }
        if table.has_conflicts() {
            return Err(MigrateError::from(Unsupported::Conflicts {
                table: name.to_string(),
            })
            .into());
        }

        let legacy_schema = table.schema();
        let schema = if name.starts_with(options.system_table_prefix.as_str()) {
            patch_legacy_schema(legacy_schema)
        } else {
            Cow::Borrowed(legacy_schema)
        };
        validate_schema(name, &schema, &options.schema_rules)?;

        let legacy_base = reusable_baseline(legacy_schema, legacy_parent.get_table(name));
        let migrated_base = reusable_baseline(&schema, migrated_parent.get_table(name));
        let (legacy_base, migrated_base, incremental) = match (legacy_base, migrated_base) {
            (Some(l), Some(m)) => (Arc::clone(l), Arc::clone(m), true),
            _ => (
                Arc::new(LegacyTable::empty(legacy_schema)),
                Arc::new(Table::empty(&schema)),
                false,
            ),
        };
        tracing::debug!(
            table = name,
            incremental,
            rows = table.rows().len(),
            "migrating table"
        );

        let table = migrate_table(
            name,
            &schema,
            &legacy_base,
            table,
            &migrated_base,
            options,
            cancel,
        )?;
        migrated = migrated.put_table(name, table);
    }
    Ok(migrated)
}
