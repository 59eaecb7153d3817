//! Result tables.
//!
//! A table on the wire is a header followed by its rows:
//!
//! ```text
//! i32 total length       (everything after this field)
//! i32 metadata length    (status code through the last column name)
//! i8  status code
//! i16 column count
//! i8  column type  x column count     (bare bytes, no length prefix)
//! str column name  x column count
//! i32 row count
//! row              x row count        (i32 length + untagged values)
//! ```
//!
//! The row span is always bounded by the total length. Under
//! [`DecodePolicy::Eager`] every row is decoded up front; under
//! [`DecodePolicy::Lazy`] the span is retained verbatim and rows are decoded
//! on demand through a [`RowCursor`]. Both read the same bytes through the
//! same row decoder and yield the same values in the same order.
use log::debug;

use super::{
    ProtocolError,
    row::{Row, RowCursor, Slot, bind, check_shape, decode_row},
    types::WireType,
    wire::{WireError, WireReader},
};

/// Bytes of the metadata-length and row-count fields, which the total
/// length covers but the metadata length does not.
const FIXED_FIELDS_SIZE: i64 = 8;

/// How a table's rows are materialized when a response is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodePolicy {
    /// Decode every row while decoding the response.
    Eager,
    /// Keep the row bytes and decode one row at a time on request.
    #[default]
    Lazy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    kind: WireType,
    name: String,
}

impl Column {
    pub fn new(kind: WireType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> WireType {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, PartialEq)]
enum RowData {
    Eager { rows: Vec<Row>, next: usize },
    Lazy(RowCursor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    status_code: i8,
    columns: Vec<Column>,
    row_count: usize,
    data: RowData,
}

fn field(name: &'static str) -> impl FnOnce(WireError) -> ProtocolError {
    move |source| ProtocolError::TableHeader {
        field: name,
        source,
    }
}

fn count(name: &'static str, value: i64) -> Result<usize, ProtocolError> {
    usize::try_from(value).map_err(|_| ProtocolError::InvalidCount { field: name, value })
}

impl Table {
    pub(crate) fn decode(
        reader: &mut WireReader<'_>,
        policy: DecodePolicy,
    ) -> Result<Self, ProtocolError> {
        let total_length = reader.read_i32().map_err(field("total length"))?;
        let metadata_length = reader.read_i32().map_err(field("metadata length"))?;
        let metadata_start = reader.position();

        let status_code = reader.read_i8().map_err(field("status code"))?;
        let column_count = reader.read_i16().map_err(field("column count"))?;
        let column_count = count("column count", i64::from(column_count))?;

        let kinds = (0..column_count)
            .map(|_| {
                let code = reader.read_i8().map_err(field("column type"))?;
                WireType::try_from(code)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut columns = Vec::with_capacity(column_count);
        for kind in &kinds {
            let name = reader.read_string().map_err(field("column name"))?;
            columns.push(Column::new(*kind, name));
        }

        let metadata_read = reader.position() - metadata_start;
        if usize::try_from(metadata_length).ok() != Some(metadata_read) {
            return Err(ProtocolError::TableLengthMismatch {
                section: "metadata",
                expected: i64::from(metadata_length),
                actual: metadata_read,
            });
        }

        let row_count = reader.read_i32().map_err(field("row count"))?;
        let row_count = count("row count", i64::from(row_count))?;

        let span_length =
            i64::from(total_length) - i64::from(metadata_length) - FIXED_FIELDS_SIZE;
        let span_length =
            usize::try_from(span_length).map_err(|_| ProtocolError::TableLengthMismatch {
                section: "row data",
                expected: span_length,
                actual: reader.remaining(),
            })?;
        let span = reader.read_raw(span_length).map_err(field("row data"))?;

        debug!(
            "table: status {status_code}, {column_count} columns, {row_count} rows, \
             {span_length} row bytes ({policy:?})"
        );

        let data = match policy {
            DecodePolicy::Eager => {
                let mut rows_reader = WireReader::new(span);
                let rows = (0..row_count)
                    .map(|index| decode_row(&mut rows_reader, &kinds, index))
                    .collect::<Result<Vec<_>, _>>()?;

                if !rows_reader.is_empty() {
                    return Err(ProtocolError::TableLengthMismatch {
                        section: "row data",
                        expected: span_length as i64,
                        actual: rows_reader.position(),
                    });
                }
                RowData::Eager { rows, next: 0 }
            }
            DecodePolicy::Lazy if row_count == 0 && !span.is_empty() => {
                return Err(ProtocolError::TableLengthMismatch {
                    section: "row data",
                    expected: span_length as i64,
                    actual: 0,
                });
            }
            DecodePolicy::Lazy => RowData::Lazy(RowCursor::new(span.to_vec(), kinds, row_count)),
        };

        Ok(Self {
            status_code,
            columns,
            row_count,
            data,
        })
    }

    pub fn status_code(&self) -> i8 {
        self.status_code
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_types(&self) -> impl Iterator<Item = WireType> + '_ {
        self.columns.iter().map(Column::kind)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(Column::name)
    }

    /// Position of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn policy(&self) -> DecodePolicy {
        match self.data {
            RowData::Eager { .. } => DecodePolicy::Eager,
            RowData::Lazy(_) => DecodePolicy::Lazy,
        }
    }

    /// Every row of an eagerly decoded table; `None` for a lazy one.
    pub fn rows(&self) -> Option<&[Row]> {
        match &self.data {
            RowData::Eager { rows, .. } => Some(rows),
            RowData::Lazy(_) => None,
        }
    }

    pub fn has_next_row(&self) -> bool {
        match &self.data {
            RowData::Eager { rows, next } => *next < rows.len(),
            RowData::Lazy(cursor) => cursor.has_next_row(),
        }
    }

    /// Binds the next row into `record`, one slot per column in column order.
    ///
    /// The record is checked against the column types before any slot is
    /// written. Asking for a row after the last one fails with
    /// [`ProtocolError::NoMoreRows`].
    pub fn decode_next_row_into(&mut self, record: &mut [Slot<'_>]) -> Result<(), ProtocolError> {
        match &mut self.data {
            RowData::Eager { rows, next } => {
                let Some(row) = rows.get(*next) else {
                    return Err(ProtocolError::NoMoreRows(self.row_count));
                };

                let kinds = self.columns.iter().map(Column::kind).collect::<Vec<_>>();
                check_shape(&kinds, record)?;
                let row = row.clone();
                *next += 1;
                bind(row, record)
            }
            RowData::Lazy(cursor) => cursor.decode_next_row_into(record),
        }
    }
}
