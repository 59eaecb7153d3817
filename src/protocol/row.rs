//! Row values and record binding.
//!
//! Row data is schema-driven: each row is an `i32` byte length followed by
//! one untagged value per column, in column order, typed by the table header.
//! Callers bind a row into their own variables by handing over an ordered
//! list of [`Slot`]s; binding is positional, never by column name.
use log::trace;

use super::{
    ProtocolError,
    types::{Value, WireType},
    wire::WireReader,
};

/// One decoded row, aligned 1:1 with its table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Row(Vec<Value>);

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl IntoIterator for Row {
    type Item = Value;
    type IntoIter = std::vec::IntoIter<Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A typed destination for one column of a row.
///
/// Integer slots accept narrower integer columns (a `SHORT` column fits an
/// [`Slot::Int`] or [`Slot::Long`]); [`Slot::Value`] accepts any column.
#[derive(Debug)]
pub enum Slot<'a> {
    Bool(&'a mut bool),
    Short(&'a mut i16),
    Int(&'a mut i32),
    Long(&'a mut i64),
    Float(&'a mut f64),
    String(&'a mut String),
    Timestamp(&'a mut i64),
    Value(&'a mut Value),
}

impl Slot<'_> {
    fn name(&self) -> &'static str {
        match self {
            Slot::Bool(_) => "bool",
            Slot::Short(_) => "i16",
            Slot::Int(_) => "i32",
            Slot::Long(_) => "i64",
            Slot::Float(_) => "f64",
            Slot::String(_) => "string",
            Slot::Timestamp(_) => "timestamp",
            Slot::Value(_) => "value",
        }
    }

    /// Whether a column of `kind` can be written into this slot.
    pub fn accepts(&self, kind: WireType) -> bool {
        use WireType as W;

        match self {
            Slot::Bool(_) => kind == W::Bool,
            Slot::Short(_) => kind == W::Short,
            Slot::Int(_) => matches!(kind, W::Short | W::Int),
            Slot::Long(_) => matches!(kind, W::Short | W::Int | W::Long | W::Timestamp),
            Slot::Float(_) => kind == W::Float,
            Slot::String(_) => kind == W::String,
            Slot::Timestamp(_) => kind == W::Timestamp,
            Slot::Value(_) => kind.is_column(),
        }
    }

    fn assign(&mut self, field: usize, value: Value) -> Result<(), ProtocolError> {
        match (self, value) {
            (Slot::Bool(dst), Value::Bool(v)) => **dst = v,
            (Slot::Short(dst), Value::Short(v)) => **dst = v,
            (Slot::Int(dst), Value::Short(v)) => **dst = i32::from(v),
            (Slot::Int(dst), Value::Int(v)) => **dst = v,
            (Slot::Long(dst), Value::Short(v)) => **dst = i64::from(v),
            (Slot::Long(dst), Value::Int(v)) => **dst = i64::from(v),
            (Slot::Long(dst), Value::Long(v) | Value::Timestamp(v)) => **dst = v,
            (Slot::Float(dst), Value::Float(v)) => **dst = v,
            (Slot::String(dst), Value::String(v)) => **dst = v,
            (Slot::Timestamp(dst), Value::Timestamp(v)) => **dst = v,
            (Slot::Value(dst), v) => **dst = v,
            (slot, v) => {
                return Err(ProtocolError::FieldKind {
                    field,
                    slot: slot.name(),
                    column: v.wire_type(),
                });
            }
        }
        Ok(())
    }
}

/// Checks a record shape against the column kinds without writing anything.
pub(crate) fn check_shape(kinds: &[WireType], record: &[Slot<'_>]) -> Result<(), ProtocolError> {
    if kinds.len() != record.len() {
        return Err(ProtocolError::FieldCount {
            expected: kinds.len(),
            actual: record.len(),
        });
    }

    for (field, (kind, slot)) in kinds.iter().zip(record).enumerate() {
        if !kind.is_column() {
            return Err(ProtocolError::UnsupportedColumnType(*kind));
        }
        if !slot.accepts(*kind) {
            return Err(ProtocolError::FieldKind {
                field,
                slot: slot.name(),
                column: *kind,
            });
        }
    }
    Ok(())
}

/// Writes a decoded row into a record already checked by [`check_shape`].
pub(crate) fn bind(row: Row, record: &mut [Slot<'_>]) -> Result<(), ProtocolError> {
    for (field, (value, slot)) in row.into_iter().zip(record.iter_mut()).enumerate() {
        slot.assign(field, value)?;
    }
    Ok(())
}

/// Decodes one length-prefixed row. `index` is only used for error context.
pub(crate) fn decode_row(
    reader: &mut WireReader<'_>,
    kinds: &[WireType],
    index: usize,
) -> Result<Row, ProtocolError> {
    let declared = reader.read_i32()?;
    let start = reader.position();

    let values = kinds
        .iter()
        .map(|kind| Value::decode_untagged(*kind, reader))
        .collect::<Result<Vec<_>, _>>()?;

    let consumed = reader.position() - start;
    if usize::try_from(declared).ok() != Some(consumed) {
        return Err(ProtocolError::RowLengthMismatch {
            row: index,
            expected: declared,
            actual: consumed,
        });
    }
    Ok(Row(values))
}

/// Forward-only cursor over a table's retained row bytes.
///
/// Rows are decoded one at a time, on demand. The cursor never reads past
/// the declared row count, and a failed decode leaves it where it was.
#[derive(Debug, Clone, PartialEq)]
pub struct RowCursor {
    span: Vec<u8>,
    kinds: Vec<WireType>,
    row_count: usize,
    decoded: usize,
    offset: usize,
}

impl RowCursor {
    pub(crate) fn new(span: Vec<u8>, kinds: Vec<WireType>, row_count: usize) -> Self {
        Self {
            span,
            kinds,
            row_count,
            decoded: 0,
            offset: 0,
        }
    }

    pub fn has_next_row(&self) -> bool {
        self.decoded < self.row_count
    }

    /// Decodes the next row into `record`, which must have one compatible
    /// slot per column.
    pub fn decode_next_row_into(&mut self, record: &mut [Slot<'_>]) -> Result<(), ProtocolError> {
        if !self.has_next_row() {
            return Err(ProtocolError::NoMoreRows(self.row_count));
        }
        check_shape(&self.kinds, record)?;

        let mut reader = WireReader::new(&self.span[self.offset..]);
        let row = decode_row(&mut reader, &self.kinds, self.decoded)?;

        // The last row must end exactly at the end of the span.
        let end = self.offset + reader.position();
        if self.decoded + 1 == self.row_count && end != self.span.len() {
            return Err(ProtocolError::TableLengthMismatch {
                section: "row data",
                expected: self.span.len() as i64,
                actual: end,
            });
        }

        trace!("decoded row {} of {}", self.decoded + 1, self.row_count);
        self.offset = end;
        self.decoded += 1;
        bind(row, record)
    }
}
