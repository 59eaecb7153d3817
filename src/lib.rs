//! A synchronous client for the VoltDB binary wire protocol.
//!
//! [`Connection`] dials a node, logs in and invokes stored procedures one at
//! a time. The byte-level formats live in [`protocol`].
pub mod cli;
pub mod connection;
pub mod protocol;

pub use connection::{Connection, ConnectionConfig, ConnectionError, ConnectionState, Timeouts};
pub use protocol::{Credential, DecodePolicy, Response, Row, Slot, Table, Value};
