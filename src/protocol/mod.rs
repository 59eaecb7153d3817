//! Client side of the VoltDB wire protocol.
//!
//! This module defines the byte-exact formats exchanged between a client and
//! the database server: the message envelope, the login handshake, stored
//! procedure invocations and the result tables that come back. It contains no
//! socket handling beyond the [`ProtocolTransport`], which moves whole frames
//! over any timed byte stream; the [`connection`](crate::connection) module
//! drives it.
//!
//! # Overview
//!
//! Every message in either direction is wrapped in the same envelope:
//!
//! ```text
//! +------------------+---------+-----------------+
//! | length (i32, BE) | version |     payload     |
//! +------------------+---------+-----------------+
//!       4 bytes        1 byte    length - 1 bytes
//! ```
//!
//! `length` counts the version byte, so an `N`-byte payload always produces
//! an `N + 5` byte envelope.
//!
//! # Key Components
//!
//! - [`wire`]: Big-endian fixed-width primitives and length-prefixed strings.
//! - [`WireType`] / [`Value`]: The type-code registry shared by parameters
//!   (tagged) and table columns (untagged).
//! - [`login`]: Login request and session advertisement.
//! - [`ProcedureCall`]: Invocation encoding.
//! - [`Response`]: Envelope decoding, gated by the fields-present bitmask.
//! - [`Table`] / [`Row`]: Column metadata and eager or lazy row decoding.
//!
//! # See Also
//!
//! - [`connection`](crate::connection): Socket ownership, handshake and timeouts.
mod frame;
pub mod login;
mod request;
mod response;
mod row;
mod table;
mod transport;
mod types;
pub mod wire;

#[cfg(test)]
pub(crate) mod fixtures;

use thiserror::Error;

pub use frame::{MAX_FRAME_LENGTH, PROTOCOL_VERSION, decode_frame, encode_frame};
pub use login::{Credential, SessionInfo};
pub use request::ProcedureCall;
pub use response::{FieldsPresent, Response, Status};
pub use row::{Row, RowCursor, Slot};
pub use table::{Column, DecodePolicy, Table};
pub use transport::{ProtocolTransport, TimedStream, TransportError};
pub use types::{Value, WireType};
pub use wire::WireError;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported protocol version {actual}, expected {expected}")]
    VersionMismatch { expected: i8, actual: i8 },

    #[error("invalid frame length {0}")]
    FrameLength(i32),

    #[error("frame of {length} bytes exceeds the {max} byte limit")]
    FrameTooLarge { length: usize, max: usize },

    #[error("truncated frame: expected {expected} bytes, found {actual}")]
    FrameTruncated { expected: usize, actual: usize },

    #[error("authentication failed with result code {code}")]
    AuthenticationFailed { code: i8 },

    #[error("malformed login response at '{field}': {source}")]
    Login {
        field: &'static str,
        source: WireError,
    },

    #[error("malformed procedure call at '{field}': {source}")]
    Call {
        field: &'static str,
        source: WireError,
    },

    #[error("malformed response envelope at '{field}': {source}")]
    Envelope {
        field: &'static str,
        source: WireError,
    },

    #[error("malformed table header at '{field}': {source}")]
    TableHeader {
        field: &'static str,
        source: WireError,
    },

    #[error("invalid {field} {value}")]
    InvalidCount { field: &'static str, value: i64 },

    #[error("{0} parameters do not fit a 16-bit count")]
    TooManyParameters(usize),

    #[error("cannot encode {0} parameters")]
    UnsupportedParameterType(WireType),

    #[error("cannot decode {0} columns")]
    UnsupportedColumnType(WireType),

    #[error("unknown wire type code {0}")]
    UnknownTypeCode(i8),

    #[error("row {row} declares {expected} bytes but {actual} were decoded")]
    RowLengthMismatch {
        row: usize,
        expected: i32,
        actual: usize,
    },

    #[error("table {section} declares {expected} bytes but {actual} were found")]
    TableLengthMismatch {
        section: &'static str,
        expected: i64,
        actual: usize,
    },

    #[error("record has {actual} fields but the table has {expected} columns")]
    FieldCount { expected: usize, actual: usize },

    #[error("field {field} ({slot}) cannot hold a {column} column")]
    FieldKind {
        field: usize,
        slot: &'static str,
        column: WireType,
    },

    #[error("all {0} rows have already been decoded")]
    NoMoreRows(usize),

    #[error(transparent)]
    Wire(#[from] WireError),
}
