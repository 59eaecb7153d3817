//! Wire type registry and the values it describes.
//!
//! The same one-byte codes serve two encoding disciplines. Procedure
//! parameters are self-describing: each value is preceded by its code.
//! Table rows are schema-driven: codes appear once per column in the table
//! header and row values carry no tag at all. [`Value::encode_tagged`] and
//! [`Value::decode_untagged`] are the only entry points for the two, so the
//! disciplines never mix.
use std::fmt;

use super::{
    ProtocolError,
    wire::{WireError, WireReader, WireWriter},
};

/// Closed set of on-wire type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Array,
    Null,
    /// Single byte; also carries TINYINT values.
    Bool,
    Short,
    Int,
    Long,
    Float,
    String,
    /// Microseconds since the epoch as a 64-bit integer.
    Timestamp,
    Table,
    Decimal,
    VarBinary,
}

impl WireType {
    pub const fn code(self) -> i8 {
        match self {
            WireType::Array => -99,
            WireType::Null => 1,
            WireType::Bool => 3,
            WireType::Short => 4,
            WireType::Int => 5,
            WireType::Long => 6,
            WireType::Float => 8,
            WireType::String => 9,
            WireType::Timestamp => 11,
            WireType::Table => 21,
            WireType::Decimal => 22,
            WireType::VarBinary => 25,
        }
    }

    /// Whether this client can send the type as a procedure parameter.
    pub const fn is_parameter(self) -> bool {
        matches!(
            self,
            WireType::Bool
                | WireType::Short
                | WireType::Int
                | WireType::Long
                | WireType::Float
                | WireType::String
        )
    }

    /// Whether this client can decode the type from a table column.
    pub const fn is_column(self) -> bool {
        self.is_parameter() || matches!(self, WireType::Timestamp)
    }
}

impl TryFrom<i8> for WireType {
    type Error = ProtocolError;

    fn try_from(code: i8) -> Result<Self, Self::Error> {
        Ok(match code {
            -99 => WireType::Array,
            1 => WireType::Null,
            3 => WireType::Bool,
            4 => WireType::Short,
            5 => WireType::Int,
            6 => WireType::Long,
            8 => WireType::Float,
            9 => WireType::String,
            11 => WireType::Timestamp,
            21 => WireType::Table,
            22 => WireType::Decimal,
            25 => WireType::VarBinary,
            _ => return Err(ProtocolError::UnknownTypeCode(code)),
        })
    }
}

impl From<WireType> for i8 {
    fn from(value: WireType) -> Self {
        value.code()
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WireType::Array => "ARRAY",
            WireType::Null => "NULL",
            WireType::Bool => "BOOL",
            WireType::Short => "SHORT",
            WireType::Int => "INT",
            WireType::Long => "LONG",
            WireType::Float => "FLOAT",
            WireType::String => "STRING",
            WireType::Timestamp => "TIMESTAMP",
            WireType::Table => "TABLE",
            WireType::Decimal => "DECIMAL",
            WireType::VarBinary => "VARBINARY",
        };
        f.write_str(name)
    }
}

/// A single decoded parameter or column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f64),
    String(String),
    Timestamp(i64),
}

impl Value {
    pub const fn wire_type(&self) -> WireType {
        match self {
            Value::Bool(_) => WireType::Bool,
            Value::Short(_) => WireType::Short,
            Value::Int(_) => WireType::Int,
            Value::Long(_) => WireType::Long,
            Value::Float(_) => WireType::Float,
            Value::String(_) => WireType::String,
            Value::Timestamp(_) => WireType::Timestamp,
        }
    }

    /// Writes the type code followed by the value, as procedure parameters
    /// are sent.
    pub fn encode_tagged(&self, writer: &mut WireWriter) -> Result<(), ProtocolError> {
        let kind = self.wire_type();
        if !kind.is_parameter() {
            return Err(ProtocolError::UnsupportedParameterType(kind));
        }

        writer.write_i8(kind.code())?;
        self.encode_untagged(writer)?;
        Ok(())
    }

    /// Writes the bare value, as row data carries it.
    pub fn encode_untagged(&self, writer: &mut WireWriter) -> Result<(), WireError> {
        match self {
            Value::Bool(v) => writer.write_bool(*v),
            Value::Short(v) => writer.write_i16(*v),
            Value::Int(v) => writer.write_i32(*v),
            Value::Long(v) | Value::Timestamp(v) => writer.write_i64(*v),
            Value::Float(v) => writer.write_f64(*v),
            Value::String(v) => writer.write_string(v),
        }
    }

    /// Reads a type code and the value it announces.
    pub fn decode_tagged(reader: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let kind = WireType::try_from(reader.read_i8()?)?;
        if !kind.is_parameter() {
            return Err(ProtocolError::UnsupportedParameterType(kind));
        }
        Self::decode_untagged(kind, reader)
    }

    /// Reads a bare value whose type is declared elsewhere (a column).
    pub fn decode_untagged(
        kind: WireType,
        reader: &mut WireReader<'_>,
    ) -> Result<Self, ProtocolError> {
        Ok(match kind {
            WireType::Bool => Value::Bool(reader.read_bool()?),
            WireType::Short => Value::Short(reader.read_i16()?),
            WireType::Int => Value::Int(reader.read_i32()?),
            WireType::Long => Value::Long(reader.read_i64()?),
            WireType::Float => Value::Float(reader.read_f64()?),
            WireType::String => Value::String(reader.read_string()?),
            WireType::Timestamp => Value::Timestamp(reader.read_i64()?),
            WireType::Array
            | WireType::Null
            | WireType::Table
            | WireType::Decimal
            | WireType::VarBinary => return Err(ProtocolError::UnsupportedColumnType(kind)),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) | Value::Timestamp(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Short(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}
