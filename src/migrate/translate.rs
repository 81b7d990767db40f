//! Legacy tuple to destination tuple translation.

use crate::core::{FieldDesc, LegacyTuple, NewTuple, TupleError, TupleLayout, Value};
use crate::legacy::{ChangeKind, RowDiff};

/// One edit for the tree writer: put `value` under `key`, or delete `key`
/// when `value` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TupleEdit {
    pub key: NewTuple,
    pub value: Option<NewTuple>,
    pub kind: ChangeKind,
}

/// Translates rows of one index layout.
///
/// Legacy tuples are addressed by column tag; the destination encodes the
/// layout's fields positionally. Tags missing from a legacy tuple read as
/// null, tags not in the layout are dropped.
#[derive(Clone, Debug)]
pub struct TupleTranslator {
    layout: TupleLayout,
}

impl TupleTranslator {
    pub fn new(layout: TupleLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &TupleLayout {
        &self.layout
    }

    pub fn translate_key(&self, key: &LegacyTuple) -> Result<NewTuple, TupleError> {
        let mut builder = NewTuple::builder();
        for field in &self.layout.key {
            let value = checked(field, key)?;
            if value.is_null() && !self.layout.key_nullable {
                return Err(TupleError::NullKey { tag: field.tag });
            }
            builder.push(value);
        }
        Ok(builder.finish())
    }

    pub fn translate_value(&self, value: &LegacyTuple) -> Result<NewTuple, TupleError> {
        let mut builder = NewTuple::builder();
        for field in &self.layout.value {
            builder.push(checked(field, value)?);
        }
        Ok(builder.finish())
    }

    /// Value first, then key, matching the order edits are produced in.
    pub fn translate_diff(&self, diff: &RowDiff) -> Result<TupleEdit, TupleError> {
        let value = match (diff.kind, &diff.new) {
            (ChangeKind::Removed, _) => None,
            (_, Some(new)) => Some(self.translate_value(new)?),
            (_, None) => Some(self.translate_value(&LegacyTuple::empty())?),
        };
        let key = self.translate_key(&diff.key)?;
        Ok(TupleEdit {
            key,
            value,
            kind: diff.kind,
        })
    }

    /// Decodes a destination row back into tag order for comparisons.
    pub fn decode_row(
        &self,
        key: &NewTuple,
        value: &NewTuple,
    ) -> Result<Vec<(u64, Value)>, TupleError> {
        let kinds = |fields: &[FieldDesc]| fields.iter().map(|f| f.kind).collect::<Vec<_>>();
        let keys = key.decode(&kinds(&self.layout.key))?;
        let values = value.decode(&kinds(&self.layout.value))?;
        let tags = self.layout.key.iter().chain(&self.layout.value).map(|f| f.tag);
        Ok(tags.zip(keys.into_iter().chain(values)).collect())
    }
}

fn checked<'a>(field: &FieldDesc, tuple: &'a LegacyTuple) -> Result<&'a Value, TupleError> {
    let value = tuple.get(field.tag);
    if value.fits(field.kind) {
        Ok(value)
    } else {
        Err(TupleError::KindMismatch {
            tag: field.tag,
            expected: field.kind,
            found: value.kind_name(),
        })
    }
}
