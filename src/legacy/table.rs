//! Legacy tables and root snapshots.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::map::LegacyMap;
use crate::core::{ContentHash, ContentHasher, ForeignKeyCollection, LegacyTuple, Schema};

/// One legacy table: schema, primary row map and secondary index maps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTable {
    schema: Schema,
    rows: LegacyMap,
    indexes: BTreeMap<String, LegacyMap>,
    auto_increment: u64,
    conflicts: u64,
}

impl LegacyTable {
    pub fn new(
        schema: Schema,
        rows: LegacyMap,
        indexes: BTreeMap<String, LegacyMap>,
        auto_increment: u64,
    ) -> Self {
        Self {
            schema,
            rows,
            indexes,
            auto_increment,
            conflicts: 0,
        }
    }

    /// Empty table of `schema` with an empty map for every declared index.
    pub fn empty(schema: &Schema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .map(|def| (def.name.clone(), LegacyMap::empty()))
            .collect();
        Self::new(schema.clone(), LegacyMap::empty(), indexes, 0)
    }

    /// Builds a table from its primary rows, deriving every secondary index.
    pub fn from_rows<I>(schema: Schema, rows: I) -> Self
    where
        I: IntoIterator<Item = (LegacyTuple, LegacyTuple)>,
    {
        let rows = LegacyMap::from_entries(rows);
        let mut indexes = BTreeMap::new();
        for def in &schema.indexes {
            let layout = schema.index_layout(def);
            let entries = rows.iter().map(|(key, value)| {
                let index_key = LegacyTuple::new(layout.key.iter().map(|field| {
                    let from_key = key.get(field.tag);
                    let v = if from_key.is_null() {
                        value.get(field.tag)
                    } else {
                        from_key
                    };
                    (field.tag, v.clone())
                }));
                (index_key, LegacyTuple::empty())
            });
            indexes.insert(def.name.clone(), LegacyMap::from_entries(entries));
        }
        Self::new(schema, rows, indexes, 0)
    }

    pub fn with_auto_increment(mut self, value: u64) -> Self {
        self.auto_increment = value;
        self
    }

    /// Marks the table as carrying `count` unresolved merge conflicts.
    pub fn with_conflicts(mut self, count: u64) -> Self {
        self.conflicts = count;
        self
    }

    /// Replaces the map stored for index `name`, or drops it with `None`.
    pub fn with_index_map(mut self, name: &str, map: Option<LegacyMap>) -> Self {
        match map {
            Some(map) => {
                self.indexes.insert(name.to_string(), map);
            }
            None => {
                self.indexes.remove(name);
            }
        }
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &LegacyMap {
        &self.rows
    }

    pub fn index(&self, name: &str) -> Option<&LegacyMap> {
        self.indexes.get(name)
    }

    pub fn auto_increment(&self) -> u64 {
        self.auto_increment
    }

    pub fn has_conflicts(&self) -> bool {
        self.conflicts > 0
    }

    pub fn hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.write_str("legacy-table");
        self.schema.hash_into(&mut hasher);
        hasher.write_hash(&self.rows.hash());
        hasher.write_u64(self.indexes.len() as u64);
        for (name, map) in &self.indexes {
            hasher.write_str(name);
            hasher.write_hash(&map.hash());
        }
        hasher.write_u64(self.auto_increment);
        hasher.write_u64(self.conflicts);
        hasher.finish()
    }
}

/// Legacy root snapshot: every table of one commit plus its foreign keys.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacyRoot {
    tables: BTreeMap<String, Arc<LegacyTable>>,
    foreign_keys: ForeignKeyCollection,
}

impl LegacyRoot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn put_table(mut self, name: impl Into<String>, table: LegacyTable) -> Self {
        self.tables.insert(name.into(), Arc::new(table));
        self
    }

    pub fn remove_table(mut self, name: &str) -> Self {
        self.tables.remove(name);
        self
    }

    pub fn with_foreign_keys(mut self, foreign_keys: ForeignKeyCollection) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    pub fn get_table(&self, name: &str) -> Option<&Arc<LegacyTable>> {
        self.tables.get(name)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = (&str, &Arc<LegacyTable>)> {
        self.tables.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn foreign_keys(&self) -> &ForeignKeyCollection {
        &self.foreign_keys
    }

    pub fn hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.write_str("legacy-root");
        hasher.write_u64(self.tables.len() as u64);
        for (name, table) in &self.tables {
            hasher.write_str(name);
            hasher.write_hash(&table.hash());
        }
        self.foreign_keys.hash_into(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, ColumnKind, IndexDef, Value};

    fn people() -> Schema {
        Schema::new(vec![
            Column::new("id", 1, ColumnKind::Int, true),
            Column::new("name", 2, ColumnKind::String, false),
        ])
        .with_index(IndexDef::new("by_name", vec![2]))
    }

    fn row(id: i64, name: Option<&str>) -> (LegacyTuple, LegacyTuple) {
        let value = match name {
            Some(name) => Value::from(name),
            None => Value::Null,
        };
        (
            LegacyTuple::new([(1, Value::Int(id))]),
            LegacyTuple::sparse([(2, value)]),
        )
    }

    #[test]
    fn from_rows_derives_secondary_index() {
        let table = LegacyTable::from_rows(people(), [row(2, Some("b")), row(1, None)]);
        let index = table.index("by_name").expect("index derived");
        let keys: Vec<_> = index.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![
                LegacyTuple::new([(2, Value::Null), (1, Value::Int(1))]),
                LegacyTuple::new([(2, Value::from("b")), (1, Value::Int(2))]),
            ]
        );
    }

    #[test]
    fn root_hash_tracks_table_content() {
        let root = |table: LegacyTable| LegacyRoot::empty().put_table("t", table);
        let a = root(LegacyTable::empty(&people()));
        let b = root(LegacyTable::from_rows(people(), [row(1, None)]));
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), root(LegacyTable::empty(&people())).hash());
        assert_ne!(
            a.hash(),
            root(LegacyTable::empty(&people()).with_conflicts(1)).hash()
        );
    }
}
