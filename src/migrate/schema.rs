//! Schema normalization before migration and validation of the result.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::translate::TupleTranslator;
use super::{MigrateError, Unsupported};
use crate::Error;
use crate::core::{
    ColumnDefault, ColumnKind, CoreError, LegacyTuple, Schema, SqlType, TupleLayout, Value,
};
use crate::legacy::{LegacyMap, LegacyRoot};
use crate::store::{RootValue, TupleMap};

/// Rewrites legacy quirks the destination format does not accept.
///
/// `Text` columns stored as plain strings get the string kind's default SQL
/// type. Names, tags, order, key membership and constraints are kept. The
/// input is borrowed back unchanged when nothing needed patching.
pub fn patch_legacy_schema(schema: &Schema) -> Cow<'_, Schema> {
    let needs_patch = |kind: ColumnKind, sql_type: &SqlType| {
        kind == ColumnKind::String && *sql_type == SqlType::Text
    };
    if !schema
        .columns
        .iter()
        .any(|c| needs_patch(c.kind, &c.sql_type))
    {
        return Cow::Borrowed(schema);
    }
    let mut patched = schema.clone();
    for column in &mut patched.columns {
        if needs_patch(column.kind, &column.sql_type) {
            column.sql_type = column.kind.default_sql_type();
        }
    }
    Cow::Owned(patched)
}

/// One check a schema must pass before its table is migrated.
pub trait SchemaRule: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// `Err(reason)` when `schema` violates the rule.
    fn check(&self, schema: &Schema) -> Result<(), String>;
}

#[derive(Debug)]
pub struct RejectKeyless;

impl SchemaRule for RejectKeyless {
    fn name(&self) -> &'static str {
        "keyless"
    }

    fn check(&self, schema: &Schema) -> Result<(), String> {
        if schema.is_keyless() {
            return Err("tables without a primary key are not supported".to_string());
        }
        Ok(())
    }
}

/// Enum and set members must be non-empty and distinct.
#[derive(Debug)]
pub struct EnumMembers;

impl SchemaRule for EnumMembers {
    fn name(&self) -> &'static str {
        "enum_members"
    }

    fn check(&self, schema: &Schema) -> Result<(), String> {
        for column in &schema.columns {
            let members = match &column.sql_type {
                SqlType::Enum(members) | SqlType::Set(members) => members,
                _ => continue,
            };
            let mut seen = BTreeSet::new();
            for member in members {
                if member.is_empty() {
                    return Err(format!("column {} has an empty member", column.name));
                }
                if !seen.insert(member.as_str()) {
                    return Err(format!(
                        "column {} repeats member {member:?}",
                        column.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Expression defaults must be parenthesized, as the destination parser
/// requires.
#[derive(Debug)]
pub struct ParenthesizedDefaults;

impl SchemaRule for ParenthesizedDefaults {
    fn name(&self) -> &'static str {
        "expression_default"
    }

    fn check(&self, schema: &Schema) -> Result<(), String> {
        for column in &schema.columns {
            if let Some(ColumnDefault::Expression(expr)) = &column.default {
                let expr = expr.trim();
                if !(expr.starts_with('(') && expr.ends_with(')')) {
                    return Err(format!(
                        "column {} has unparenthesized default expression {expr:?}",
                        column.name
                    ));
                }
            }
        }
        Ok(())
    }
}

pub fn default_rules() -> Vec<Arc<dyn SchemaRule>> {
    vec![
        Arc::new(RejectKeyless),
        Arc::new(EnumMembers),
        Arc::new(ParenthesizedDefaults),
    ]
}

/// Runs every rule; the first violation is reported as unsupported data.
pub fn validate_schema(
    table: &str,
    schema: &Schema,
    rules: &[Arc<dyn SchemaRule>],
) -> Result<(), MigrateError> {
    for rule in rules {
        rule.check(schema).map_err(|reason| Unsupported::Schema {
            table: table.to_string(),
            rule: rule.name(),
            reason,
        })?;
    }
    Ok(())
}

/// How much of a migrated root is compared against its source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Row counts plus a row-by-row comparison of every index.
    #[default]
    Full,
    /// Table sets and row counts only.
    Counts,
    Off,
}

impl ValidationMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "full" => Some(ValidationMode::Full),
            "counts" => Some(ValidationMode::Counts),
            "off" | "none" => Some(ValidationMode::Off),
            _ => None,
        }
    }
}

/// Checks that `migrated` holds exactly the data of `legacy`.
pub fn validate_root_value(
    legacy: &LegacyRoot,
    migrated: &RootValue,
    mode: ValidationMode,
) -> Result<(), Error> {
    if mode == ValidationMode::Off {
        return Ok(());
    }
    let legacy_names: Vec<&str> = legacy.table_names().collect();
    let migrated_names: Vec<&str> = migrated.table_names().collect();
    if legacy_names != migrated_names {
        return Err(integrity(
            "<root>",
            format!("table sets differ: legacy {legacy_names:?}, migrated {migrated_names:?}"),
        ));
    }

    for (name, legacy_table) in legacy.tables() {
        let migrated_table = migrated
            .get_table(name)
            .ok_or_else(|| integrity(name, "table missing after migration".to_string()))?;
        let schema = migrated_table.schema();
        compare_maps(
            name,
            "primary index",
            &schema.row_layout(),
            legacy_table.rows(),
            migrated_table.rows(),
            mode,
        )?;
        for def in &schema.indexes {
            let what = format!("index {}", def.name);
            let legacy_index = legacy_table
                .index(&def.name)
                .ok_or_else(|| integrity(name, format!("legacy {what} missing")))?;
            let migrated_index = migrated_table
                .indexes()
                .get_index(&def.name)
                .ok_or_else(|| integrity(name, format!("migrated {what} missing")))?;
            compare_maps(
                name,
                &what,
                &schema.index_layout(def),
                legacy_index,
                migrated_index,
                mode,
            )?;
        }
    }
    Ok(())
}

fn compare_maps(
    table: &str,
    what: &str,
    layout: &TupleLayout,
    legacy: &LegacyMap,
    migrated: &TupleMap,
    mode: ValidationMode,
) -> Result<(), Error> {
    if legacy.len() != migrated.len() {
        return Err(integrity(
            table,
            format!(
                "{what} has {} legacy rows but {} migrated rows",
                legacy.len(),
                migrated.len()
            ),
        ));
    }
    if mode != ValidationMode::Full {
        return Ok(());
    }
    let translator = TupleTranslator::new(layout.clone());
    // Both maps iterate in key order and translation preserves order, so the
    // same row sits at the same position on both sides.
    for ((legacy_key, legacy_value), (key, value)) in legacy.iter().zip(migrated.iter()) {
        let expected = expected_fields(layout, legacy_key, legacy_value);
        let got = translator
            .decode_row(key, value)
            .map_err(CoreError::from)?;
        if expected != got {
            return Err(integrity(
                table,
                format!("{what} row {key} differs: expected {expected:?}, found {got:?}"),
            ));
        }
    }
    Ok(())
}

fn expected_fields(
    layout: &TupleLayout,
    key: &LegacyTuple,
    value: &LegacyTuple,
) -> Vec<(u64, Value)> {
    let keys = layout.key.iter().map(|f| (f.tag, key.get(f.tag).clone()));
    let values = layout.value.iter().map(|f| (f.tag, value.get(f.tag).clone()));
    keys.chain(values).collect()
}

fn integrity(table: &str, reason: String) -> Error {
    MigrateError::Integrity {
        table: table.to_string(),
        reason,
    }
    .into()
}
