//! Table schemas and the tuple layouts derived from them.

use serde::{Deserialize, Serialize};

use super::hash::ContentHasher;

/// Storage kind of a column: how its values are physically encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    Blob,
}

impl ColumnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Uint => "uint",
            ColumnKind::Float => "float",
            ColumnKind::String => "string",
            ColumnKind::Blob => "blob",
        }
    }

    /// SQL type a column of this kind gets when none is declared.
    pub fn default_sql_type(self) -> SqlType {
        match self {
            ColumnKind::Bool => SqlType::TinyInt,
            ColumnKind::Int => SqlType::BigInt,
            ColumnKind::Uint => SqlType::UnsignedBigInt,
            ColumnKind::Float => SqlType::Double,
            ColumnKind::String => SqlType::Varchar(DEFAULT_VARCHAR_LEN),
            ColumnKind::Blob => SqlType::LongBlob,
        }
    }
}

pub const DEFAULT_VARCHAR_LEN: u32 = 16_383;

/// Declared SQL type of a column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    TinyInt,
    BigInt,
    UnsignedBigInt,
    Double,
    Varchar(u32),
    Text,
    LongBlob,
    Enum(Vec<String>),
    Set(Vec<String>),
}

impl SqlType {
    fn hash_into(&self, hasher: &mut ContentHasher) {
        match self {
            SqlType::TinyInt => hasher.write_str("tinyint"),
            SqlType::BigInt => hasher.write_str("bigint"),
            SqlType::UnsignedBigInt => hasher.write_str("unsigned_bigint"),
            SqlType::Double => hasher.write_str("double"),
            SqlType::Varchar(len) => {
                hasher.write_str("varchar");
                hasher.write_u64(u64::from(*len));
            }
            SqlType::Text => hasher.write_str("text"),
            SqlType::LongBlob => hasher.write_str("longblob"),
            SqlType::Enum(values) => {
                hasher.write_str("enum");
                write_strs(hasher, values);
            }
            SqlType::Set(values) => {
                hasher.write_str("set");
                write_strs(hasher, values);
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    NotNull,
    Check { name: String, expr: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDefault {
    Literal(String),
    Expression(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub tag: u64,
    pub kind: ColumnKind,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub constraints: Vec<Constraint>,
    pub default: Option<ColumnDefault>,
}

impl Column {
    pub fn new(name: impl Into<String>, tag: u64, kind: ColumnKind, primary_key: bool) -> Self {
        let mut constraints = Vec::new();
        if primary_key {
            constraints.push(Constraint::NotNull);
        }
        Self {
            name: name.into(),
            tag,
            kind,
            sql_type: kind.default_sql_type(),
            primary_key,
            constraints,
            default: None,
        }
    }

    pub fn with_sql_type(mut self, sql_type: SqlType) -> Self {
        self.sql_type = sql_type;
        self
    }

    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_str(&self.name);
        hasher.write_u64(self.tag);
        hasher.write_str(self.kind.as_str());
        self.sql_type.hash_into(hasher);
        hasher.write_u64(u64::from(self.primary_key));
        hasher.write_u64(self.constraints.len() as u64);
        for constraint in &self.constraints {
            match constraint {
                Constraint::NotNull => hasher.write_str("not_null"),
                Constraint::Check { name, expr } => {
                    hasher.write_str("check");
                    hasher.write_str(name);
                    hasher.write_str(expr);
                }
            }
        }
        match &self.default {
            None => hasher.write_str("no_default"),
            Some(ColumnDefault::Literal(value)) => {
                hasher.write_str("literal");
                hasher.write_str(value);
            }
            Some(ColumnDefault::Expression(expr)) => {
                hasher.write_str("expression");
                hasher.write_str(expr);
            }
        }
    }
}

/// Secondary index definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexDef {
    pub name: String,
    /// Indexed column tags, in index order.
    pub tags: Vec<u64>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, tags: Vec<u64>) -> Self {
        Self {
            name: name.into(),
            tags,
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<Column>,
    pub indexes: Vec<IndexDef>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            indexes: Vec::new(),
        }
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column_by_tag(&self, tag: u64) -> Option<&Column> {
        self.columns.iter().find(|c| c.tag == tag)
    }

    pub fn pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }

    pub fn non_pk_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    pub fn is_keyless(&self) -> bool {
        self.pk_columns().next().is_none()
    }

    pub fn index(&self, name: &str) -> Option<&IndexDef> {
        self.indexes.iter().find(|i| i.name == name)
    }

    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_u64(self.columns.len() as u64);
        for column in &self.columns {
            column.hash_into(hasher);
        }
        hasher.write_u64(self.indexes.len() as u64);
        for index in &self.indexes {
            hasher.write_str(&index.name);
            write_tags(hasher, &index.tags);
            hasher.write_u64(u64::from(index.unique));
        }
    }

    /// Layout of the primary row index: key columns, then value columns.
    pub fn row_layout(&self) -> TupleLayout {
        TupleLayout {
            key: self.pk_columns().map(FieldDesc::from).collect(),
            value: self.non_pk_columns().map(FieldDesc::from).collect(),
            key_nullable: false,
        }
    }

    /// Layout of a secondary index: the indexed columns followed by any
    /// primary-key columns not already indexed; no value columns.
    pub fn index_layout(&self, def: &IndexDef) -> TupleLayout {
        let mut key: Vec<FieldDesc> = def
            .tags
            .iter()
            .filter_map(|tag| self.column_by_tag(*tag))
            .map(FieldDesc::from)
            .collect();
        for pk in self.pk_columns() {
            if !def.tags.contains(&pk.tag) {
                key.push(FieldDesc::from(pk));
            }
        }
        TupleLayout {
            key,
            value: Vec::new(),
            key_nullable: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub table: String,
    pub columns: Vec<u64>,
    pub referenced_table: String,
    pub referenced_columns: Vec<u64>,
}

/// Foreign keys of one root. Carried across migration unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyCollection {
    pub keys: Vec<ForeignKey>,
}

impl ForeignKeyCollection {
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_u64(self.keys.len() as u64);
        for key in &self.keys {
            hasher.write_str(&key.name);
            hasher.write_str(&key.table);
            write_tags(hasher, &key.columns);
            hasher.write_str(&key.referenced_table);
            write_tags(hasher, &key.referenced_columns);
        }
    }
}

fn write_tags(hasher: &mut ContentHasher, tags: &[u64]) {
    hasher.write_u64(tags.len() as u64);
    for tag in tags {
        hasher.write_u64(*tag);
    }
}

fn write_strs(hasher: &mut ContentHasher, values: &[String]) {
    hasher.write_u64(values.len() as u64);
    for value in values {
        hasher.write_str(value);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldDesc {
    pub tag: u64,
    pub kind: ColumnKind,
}

impl From<&Column> for FieldDesc {
    fn from(column: &Column) -> Self {
        Self {
            tag: column.tag,
            kind: column.kind,
        }
    }
}

/// Field descriptors for the key and value tuples of one index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleLayout {
    pub key: Vec<FieldDesc>,
    pub value: Vec<FieldDesc>,
    /// Secondary index keys may hold nulls; primary keys may not.
    pub key_nullable: bool,
}
