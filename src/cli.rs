//! CLI utilities for voltwire.
//!
//! Parameter literal parsing and plain-text rendering of responses, shared by
//! the `volt-call` binary.
use std::io::{self, Write};

use thiserror::Error;

use crate::protocol::{ProtocolError, Response, Slot, Table, Value};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("invalid {kind} literal '{literal}'")]
    InvalidLiteral { kind: &'static str, literal: String },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Parses a `type:value` parameter literal.
///
/// Recognized prefixes are `bool`, `short`, `int`, `long`, `float` and `str`.
/// Anything else, including text with no prefix or an unknown one, is taken
/// verbatim as a string.
pub fn parse_param(literal: &str) -> Result<Value, ParamError> {
    let Some((kind, text)) = literal.split_once(':') else {
        return Ok(Value::from(literal));
    };

    fn invalid(kind: &'static str, literal: &str) -> ParamError {
        ParamError::InvalidLiteral {
            kind,
            literal: literal.to_string(),
        }
    }

    match kind {
        "bool" => match text {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(invalid("bool", text)),
        },
        "short" => text
            .parse()
            .map(Value::Short)
            .map_err(|_| invalid("short", text)),
        "int" => text
            .parse()
            .map(Value::Int)
            .map_err(|_| invalid("int", text)),
        "long" => text
            .parse()
            .map(Value::Long)
            .map_err(|_| invalid("long", text)),
        "float" => text
            .parse()
            .map(Value::Float)
            .map_err(|_| invalid("float", text)),
        "str" => Ok(Value::from(text)),
        _ => Ok(Value::from(literal)),
    }
}

/// Writes every remaining row of `table`, preceded by a header line.
/// Returns the number of rows written.
pub fn render_table<W: Write>(table: &mut Table, mut writer: W) -> Result<usize, RenderError> {
    writeln!(
        writer,
        "{}",
        table.column_names().collect::<Vec<_>>().join(" | ")
    )?;

    let mut written = 0;
    let mut values = vec![Value::Bool(false); table.column_count()];
    while table.has_next_row() {
        let mut record = values.iter_mut().map(Slot::Value).collect::<Vec<_>>();
        table.decode_next_row_into(&mut record)?;

        let line = values
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(" | ");
        writeln!(writer, "{line}")?;
        written += 1;
    }
    Ok(written)
}

/// Writes the response status, any messages and every table.
pub fn render_response<W: Write>(response: &mut Response, mut writer: W) -> Result<(), RenderError> {
    writeln!(
        writer,
        "status: {} (app status {}), {} ms in cluster",
        response.status(),
        response.app_status(),
        response.cluster_latency()
    )?;
    if let Some(message) = response.status_message() {
        writeln!(writer, "status message: {message}")?;
    }
    if let Some(message) = response.app_status_message() {
        writeln!(writer, "app status message: {message}")?;
    }
    if let Some(exception) = response.exception_bytes() {
        writeln!(writer, "exception: {} bytes", exception.len())?;
    }

    for index in 0..response.table_count() {
        let Some(table) = response.table_mut(index) else {
            break;
        };
        writeln!(
            writer,
            "-- table {index} (status {}, {} rows)",
            table.status_code(),
            table.row_count()
        )?;
        render_table(table, &mut writer)?;
    }
    Ok(())
}
