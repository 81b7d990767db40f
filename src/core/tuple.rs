//! Row tuple encodings.
//!
//! `LegacyTuple` is the tagged field list of the legacy map format: each field
//! carries its column tag. `NewTuple` is the
//! destination encoding: the schema's fields in declaration order, each
//! encoded so that byte order equals value order. Keys therefore sort the
//! same way in both formats, which is what lets the pipeline rebuild a map in
//! a single forward pass.

use std::cmp::Ordering;
use std::fmt;

use super::error::TupleError;
use super::hash::ContentHasher;
use super::schema::ColumnKind;

#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    String(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Uint(_) => "uint",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Blob(_) => "blob",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Whether this value can be stored in a column of `kind`.
    pub fn fits(&self, kind: ColumnKind) -> bool {
        matches!(
            (self, kind),
            (Value::Null, _)
                | (Value::Bool(_), ColumnKind::Bool)
                | (Value::Int(_), ColumnKind::Int)
                | (Value::Uint(_), ColumnKind::Uint)
                | (Value::Float(_), ColumnKind::Float)
                | (Value::String(_), ColumnKind::String)
                | (Value::Blob(_), ColumnKind::Blob)
        )
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) => 2,
            Value::Uint(_) => 3,
            Value::Float(_) => 4,
            Value::String(_) => 5,
            Value::Blob(_) => 6,
        }
    }

    fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_u64(u64::from(self.rank()));
        match self {
            Value::Null => {}
            Value::Bool(v) => hasher.write_u64(u64::from(*v)),
            Value::Int(v) => hasher.write_u64(*v as u64),
            Value::Uint(v) => hasher.write_u64(*v),
            Value::Float(v) => hasher.write_u64(v.to_bits()),
            Value::String(v) => hasher.write_str(v),
            Value::Blob(v) => hasher.write(v),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Blob(a), Value::Blob(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

/// Legacy tagged tuple.
///
/// Value tuples usually omit null fields; key tuples carry every key field
/// (nulls included) so that all keys of one map share a tag sequence and
/// compare field by field.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LegacyTuple(Vec<(u64, Value)>);

impl LegacyTuple {
    pub fn new<I, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (u64, V)>,
        V: Into<Value>,
    {
        Self(fields.into_iter().map(|(tag, v)| (tag, v.into())).collect())
    }

    /// Like `new`, dropping null fields the way legacy value tuples are
    /// written.
    pub fn sparse<I, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (u64, V)>,
        V: Into<Value>,
    {
        let mut tuple = Self::new(fields);
        tuple.0.retain(|(_, v)| !v.is_null());
        tuple
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Value stored under `tag`; absent tags read as null.
    pub fn get(&self, tag: u64) -> &Value {
        static NULL: Value = Value::Null;
        self.0
            .iter()
            .find(|(t, _)| *t == tag)
            .map_or(&NULL, |(_, v)| v)
    }

    pub fn fields(&self) -> &[(u64, Value)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_u64(self.0.len() as u64);
        for (tag, value) in &self.0 {
            hasher.write_u64(*tag);
            value.hash_into(hasher);
        }
    }
}

const NULL_MARKER: u8 = 0x00;
const PRESENT_MARKER: u8 = 0x01;
const ESCAPE: u8 = 0xff;

/// Destination tuple: order-preserving byte encoding of a fixed field list.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NewTuple(Vec<u8>);

impl NewTuple {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn builder() -> TupleBuilder {
        TupleBuilder::default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decode fields according to `kinds`; the tuple must hold exactly that
    /// many fields.
    pub fn decode(&self, kinds: &[ColumnKind]) -> Result<Vec<Value>, TupleError> {
        let mut reader = Reader {
            buf: &self.0,
            pos: 0,
        };
        let mut out = Vec::with_capacity(kinds.len());
        for kind in kinds {
            out.push(reader.field(*kind)?);
        }
        if reader.pos != self.0.len() {
            return Err(reader.error("trailing bytes after last field"));
        }
        Ok(out)
    }
}

impl fmt::Debug for NewTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NewTuple({self})")
    }
}

impl fmt::Display for NewTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct TupleBuilder {
    buf: Vec<u8>,
}

impl TupleBuilder {
    pub fn push(&mut self, value: &Value) -> &mut Self {
        let buf = &mut self.buf;
        if value.is_null() {
            buf.push(NULL_MARKER);
            return self;
        }
        buf.push(PRESENT_MARKER);
        match value {
            Value::Null => {}
            Value::Bool(v) => buf.push(u8::from(*v)),
            Value::Int(v) => buf.extend_from_slice(&((*v as u64) ^ (1 << 63)).to_be_bytes()),
            Value::Uint(v) => buf.extend_from_slice(&v.to_be_bytes()),
            Value::Float(v) => buf.extend_from_slice(&float_key(*v).to_be_bytes()),
            Value::String(v) => push_escaped(buf, v.as_bytes()),
            Value::Blob(v) => push_escaped(buf, v),
        }
        self
    }

    pub fn finish(self) -> NewTuple {
        NewTuple(self.buf)
    }
}

fn float_key(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits >> 63 == 1 { !bits } else { bits | (1 << 63) }
}

fn float_from_key(key: u64) -> f64 {
    let bits = if key >> 63 == 1 { key & !(1 << 63) } else { !key };
    f64::from_bits(bits)
}

fn push_escaped(buf: &mut Vec<u8>, bytes: &[u8]) {
    for b in bytes {
        buf.push(*b);
        if *b == 0 {
            buf.push(ESCAPE);
        }
    }
    buf.extend_from_slice(&[0, 0]);
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn error(&self, reason: &str) -> TupleError {
        TupleError::Decode {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn byte(&mut self) -> Result<u8, TupleError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of tuple"))?;
        self.pos += 1;
        Ok(b)
    }

    fn word(&mut self) -> Result<u64, TupleError> {
        let end = self.pos + 8;
        let bytes: [u8; 8] = self
            .buf
            .get(self.pos..end)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(|| self.error("truncated 8-byte field"))?;
        self.pos = end;
        Ok(u64::from_be_bytes(bytes))
    }

    fn escaped(&mut self) -> Result<Vec<u8>, TupleError> {
        let mut out = Vec::new();
        loop {
            let b = self.byte()?;
            if b != 0 {
                out.push(b);
                continue;
            }
            match self.byte()? {
                0 => return Ok(out),
                ESCAPE => out.push(0),
                _ => return Err(self.error("invalid escape sequence")),
            }
        }
    }

    fn field(&mut self, kind: ColumnKind) -> Result<Value, TupleError> {
        match self.byte()? {
            NULL_MARKER => return Ok(Value::Null),
            PRESENT_MARKER => {}
            _ => return Err(self.error("invalid presence marker")),
        }
        Ok(match kind {
            ColumnKind::Bool => Value::Bool(self.byte()? != 0),
            ColumnKind::Int => Value::Int((self.word()? ^ (1 << 63)) as i64),
            ColumnKind::Uint => Value::Uint(self.word()?),
            ColumnKind::Float => Value::Float(float_from_key(self.word()?)),
            ColumnKind::String => {
                let bytes = self.escaped()?;
                Value::String(
                    String::from_utf8(bytes).map_err(|_| self.error("string is not UTF-8"))?,
                )
            }
            ColumnKind::Blob => Value::Blob(self.escaped()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(values: &[Value]) -> NewTuple {
        let mut builder = NewTuple::builder();
        for v in values {
            builder.push(v);
        }
        builder.finish()
    }

    #[test]
    fn sparse_tuple_omits_nulls() {
        let tuple = LegacyTuple::sparse([(1, Value::Int(4)), (2, Value::Null)]);
        assert_eq!(tuple.len(), 1);
        assert!(tuple.get(2).is_null());
        assert!(tuple.get(7).is_null());
        assert_eq!(tuple.get(1), &Value::Int(4));
    }

    #[test]
    fn null_key_fields_sort_first() {
        let null = LegacyTuple::new([(3, Value::Null), (1, Value::Int(9))]);
        let present = LegacyTuple::new([(3, Value::from("a")), (1, Value::Int(1))]);
        assert!(null < present);
    }

    #[test]
    fn decode_returns_encoded_fields() {
        let values = vec![
            Value::Int(-3),
            Value::Null,
            Value::String("a\0b".into()),
            Value::Float(-0.5),
            Value::Blob(vec![0, 0, 1]),
            Value::Bool(true),
            Value::Uint(9),
        ];
        let kinds = [
            ColumnKind::Int,
            ColumnKind::String,
            ColumnKind::String,
            ColumnKind::Float,
            ColumnKind::Blob,
            ColumnKind::Bool,
            ColumnKind::Uint,
        ];
        assert_eq!(encode(&values).decode(&kinds).unwrap(), values);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let tuple = encode(&[Value::Int(1), Value::Int(2)]);
        assert!(tuple.decode(&[ColumnKind::Int]).is_err());
    }

    fn key_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::Int),
            any::<f64>().prop_map(Value::Float),
            ".{0,6}".prop_map(Value::String),
            proptest::collection::vec(any::<u8>(), 0..6).prop_map(Value::Blob),
        ]
    }

    proptest! {
        #[test]
        fn encoding_preserves_order(a in key_value(), b in key_value()) {
            prop_assume!(a.kind_name() == b.kind_name());
            let ea = encode(std::slice::from_ref(&a));
            let eb = encode(std::slice::from_ref(&b));
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }

        #[test]
        fn composite_keys_preserve_order(
            a in (".{0,4}", any::<i64>()),
            b in (".{0,4}", any::<i64>()),
        ) {
            let va = [Value::String(a.0.clone()), Value::Int(a.1)];
            let vb = [Value::String(b.0.clone()), Value::Int(b.1)];
            prop_assert_eq!(va.cmp(&vb), encode(&va).cmp(&encode(&vb)));
        }
    }
}
