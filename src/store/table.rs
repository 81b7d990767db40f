//! Destination tables, index sets and root values.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::map::TupleMap;
use crate::core::{ContentHash, ContentHasher, ForeignKeyCollection, Schema};

/// Secondary indexes of one table, by name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexSet {
    indexes: BTreeMap<String, TupleMap>,
}

impl IndexSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_index(mut self, name: impl Into<String>, map: TupleMap) -> Self {
        self.indexes.insert(name.into(), map);
        self
    }

    pub fn get_index(&self, name: &str) -> Option<&TupleMap> {
        self.indexes.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TupleMap)> {
        self.indexes.iter().map(|(name, map)| (name.as_str(), map))
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_u64(self.indexes.len() as u64);
        for (name, map) in &self.indexes {
            hasher.write_str(name);
            hasher.write_hash(&map.hash());
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Table {
    schema: Schema,
    rows: TupleMap,
    indexes: IndexSet,
    auto_increment: u64,
}

impl Table {
    pub fn new(schema: Schema, rows: TupleMap, indexes: IndexSet, auto_increment: u64) -> Self {
        Self {
            schema,
            rows,
            indexes,
            auto_increment,
        }
    }

    /// Empty table of `schema` with an empty map for every declared index.
    pub fn empty(schema: &Schema) -> Self {
        let indexes = schema
            .indexes
            .iter()
            .fold(IndexSet::new(), |set, def| {
                set.put_index(def.name.clone(), TupleMap::empty())
            });
        Self::new(schema.clone(), TupleMap::empty(), indexes, 0)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &TupleMap {
        &self.rows
    }

    pub fn indexes(&self) -> &IndexSet {
        &self.indexes
    }

    pub fn auto_increment(&self) -> u64 {
        self.auto_increment
    }

    pub fn hash(&self) -> ContentHash {
        let mut hasher = ContentHasher::new();
        hasher.write_str("table");
        self.schema.hash_into(&mut hasher);
        hasher.write_hash(&self.rows.hash());
        self.indexes.hash_into(&mut hasher);
        hasher.write_u64(self.auto_increment);
        hasher.finish()
    }
}

/// Destination root snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootValue {
    tables: BTreeMap<String, Arc<Table>>,
    foreign_keys: ForeignKeyCollection,
}

impl RootValue {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn put_table(mut self, name: impl Into<String>, table: Table) -> Self {
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

    pub fn get_table(&self, name: &str) -> Option<&Arc<Table>> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &Arc<Table>)> {
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
        hasher.write_str("root");
        hasher.write_u64(self.tables.len() as u64);
        for (name, table) in &self.tables {
            hasher.write_str(name);
            hasher.write_hash(&table.hash());
        }
        self.foreign_keys.hash_into(&mut hasher);
        hasher.finish()
    }
}
