//! Procedure responses.
use std::fmt;

use bitflags::bitflags;
use log::debug;

use super::{
    ProtocolError,
    table::{DecodePolicy, Table},
    wire::{WireError, WireReader},
};

bitflags! {
    /// Optional envelope fields announced by the server.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldsPresent: u8 {
        /// Bit 5: a status message string follows the status byte.
        const STATUS_MESSAGE = 1 << 5;
        /// Bit 6: an exception block follows the cluster latency.
        const EXCEPTION = 1 << 6;
        /// Bit 7: an application status message follows the application status.
        const APP_STATUS_MESSAGE = 1 << 7;
    }
}

/// Outcome of a procedure invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    UserAbort,
    GracefulFailure,
    UnexpectedFailure,
    ConnectionLost,
    /// A code this client has no name for.
    Other(i8),
}

impl Status {
    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<i8> for Status {
    fn from(code: i8) -> Self {
        match code {
            1 => Status::Success,
            -1 => Status::UserAbort,
            -2 => Status::GracefulFailure,
            -3 => Status::UnexpectedFailure,
            -4 => Status::ConnectionLost,
            other => Status::Other(other),
        }
    }
}

impl From<Status> for i8 {
    fn from(status: Status) -> Self {
        match status {
            Status::Success => 1,
            Status::UserAbort => -1,
            Status::GracefulFailure => -2,
            Status::UnexpectedFailure => -3,
            Status::ConnectionLost => -4,
            Status::Other(code) => code,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Success => f.write_str("SUCCESS"),
            Status::UserAbort => f.write_str("USER_ABORT"),
            Status::GracefulFailure => f.write_str("GRACEFUL_FAILURE"),
            Status::UnexpectedFailure => f.write_str("UNEXPECTED_FAILURE"),
            Status::ConnectionLost => f.write_str("CONNECTION_LOST"),
            Status::Other(code) => write!(f, "STATUS({code})"),
        }
    }
}

/// A fully decoded procedure response.
///
/// A response is only ever built once every table in it has decoded; a
/// failure anywhere yields an error and no partial response.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    client_data: i64,
    fields_present: FieldsPresent,
    status: Status,
    status_message: Option<String>,
    app_status: i8,
    app_status_message: Option<String>,
    cluster_latency: i32,
    exception: Option<Vec<u8>>,
    tables: Vec<Table>,
}

fn field(name: &'static str) -> impl FnOnce(WireError) -> ProtocolError {
    move |source| ProtocolError::Envelope {
        field: name,
        source,
    }
}

impl Response {
    /// Decodes a response payload, materializing rows according to `policy`.
    ///
    /// Bytes after the last table are ignored.
    pub fn decode(payload: &[u8], policy: DecodePolicy) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(payload);

        let client_data = reader.read_i64().map_err(field("client data"))?;
        let fields_present =
            FieldsPresent::from_bits_retain(reader.read_u8().map_err(field("fields present"))?);
        let status = Status::from(reader.read_i8().map_err(field("status"))?);

        let status_message = if fields_present.contains(FieldsPresent::STATUS_MESSAGE) {
            Some(reader.read_string().map_err(field("status message"))?)
        } else {
            None
        };

        let app_status = reader.read_i8().map_err(field("application status"))?;
        let app_status_message = if fields_present.contains(FieldsPresent::APP_STATUS_MESSAGE) {
            Some(
                reader
                    .read_string()
                    .map_err(field("application status message"))?,
            )
        } else {
            None
        };

        let cluster_latency = reader.read_i32().map_err(field("cluster latency"))?;

        // Exception payloads stay opaque; only their length is interpreted.
        let exception = if fields_present.contains(FieldsPresent::EXCEPTION) {
            Some(reader.read_bytes().map_err(field("exception"))?.to_vec())
        } else {
            None
        };

        let result_count = reader.read_i16().map_err(field("result count"))?;
        let result_count =
            usize::try_from(result_count).map_err(|_| ProtocolError::InvalidCount {
                field: "result count",
                value: i64::from(result_count),
            })?;

        let tables = (0..result_count)
            .map(|_| Table::decode(&mut reader, policy))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "response {client_data}: {status}, {result_count} tables, {cluster_latency} ms in cluster"
        );

        Ok(Self {
            client_data,
            fields_present,
            status,
            status_message,
            app_status,
            app_status_message,
            cluster_latency,
            exception,
            tables,
        })
    }

    /// The client handle echoed back by the server.
    pub fn client_data(&self) -> i64 {
        self.client_data
    }

    pub fn fields_present(&self) -> FieldsPresent {
        self.fields_present
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn app_status(&self) -> i8 {
        self.app_status
    }

    pub fn app_status_message(&self) -> Option<&str> {
        self.app_status_message.as_deref()
    }

    /// Milliseconds the call spent inside the cluster.
    pub fn cluster_latency(&self) -> i32 {
        self.cluster_latency
    }

    pub fn exception_bytes(&self) -> Option<&[u8]> {
        self.exception.as_deref()
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// Mutable access, needed to advance a table's row cursor.
    pub fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.tables.get_mut(index)
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn into_tables(self) -> Vec<Table> {
        self.tables
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use crate::protocol::{
        Slot, Value, WireType,
        fixtures::{EnvelopeFixture, TableFixture},
    };

    use super::*;

    #[rstest]
    #[case(1, Status::Success)]
    #[case(-1, Status::UserAbort)]
    #[case(-2, Status::GracefulFailure)]
    #[case(-3, Status::UnexpectedFailure)]
    #[case(-4, Status::ConnectionLost)]
    #[case(-9, Status::Other(-9))]
    fn status_codes(#[case] code: i8, #[case] status: Status) {
        assert_eq!(Status::from(code), status);
        assert_eq!(i8::from(status), code);
    }

    #[test]
    fn minimal_response() {
        let payload = EnvelopeFixture::new(Status::Success).encode();
        let response = Response::decode(&payload, DecodePolicy::Lazy).unwrap();

        assert_eq!(response.status(), Status::Success);
        assert!(response.fields_present().is_empty());
        assert_eq!(response.status_message(), None);
        assert_eq!(response.app_status_message(), None);
        assert_eq!(response.exception_bytes(), None);
        assert_eq!(response.table_count(), 0);
        assert!(response.table(0).is_none());
    }

    #[test]
    fn optional_strings() {
        let payload = EnvelopeFixture::new(Status::GracefulFailure)
            .client_data(42)
            .status_message("constraint violation")
            .app_status(-7)
            .app_status_message("retry later")
            .cluster_latency(12)
            .encode();
        let response = Response::decode(&payload, DecodePolicy::Lazy).unwrap();

        assert_eq!(response.client_data(), 42);
        assert_eq!(response.status(), Status::GracefulFailure);
        assert_eq!(response.status_message(), Some("constraint violation"));
        assert_eq!(response.app_status(), -7);
        assert_eq!(response.app_status_message(), Some("retry later"));
        assert_eq!(response.cluster_latency(), 12);
        assert_eq!(
            response.fields_present(),
            FieldsPresent::STATUS_MESSAGE | FieldsPresent::APP_STATUS_MESSAGE
        );
    }

    #[test]
    fn exception_block_is_skipped_by_length() {
        // The exception bytes look like a result count and a table header;
        // they must be consumed as opaque data.
        let exception = [0x00, 0x01, 0xff, 0xff, 0xff, 0xff, 0x7f, 0, 0, 0, 0, 0, 9];
        let table = TableFixture::new(0, &[(WireType::Int, "n")]).row(vec![Value::Int(3)]);
        let payload = EnvelopeFixture::new(Status::UnexpectedFailure)
            .exception(&exception)
            .table(table)
            .encode();
        let response = Response::decode(&payload, DecodePolicy::Eager).unwrap();

        assert_eq!(response.exception_bytes(), Some(exception.as_slice()));
        assert_eq!(response.table_count(), 1);
        assert_eq!(
            response.table(0).unwrap().rows().unwrap()[0].values(),
            &[Value::Int(3)]
        );
    }

    #[test]
    fn empty_exception_block() {
        let payload = EnvelopeFixture::new(Status::Success).exception(&[]).encode();
        let response = Response::decode(&payload, DecodePolicy::Lazy).unwrap();

        assert_eq!(response.exception_bytes(), Some(&[][..]));
    }

    #[test]
    fn tables_in_order() {
        let first = TableFixture::new(0, &[(WireType::String, "s")])
            .row(vec![Value::from("a")])
            .row(vec![Value::from("b")]);
        let second = TableFixture::new(0, &[(WireType::Long, "n")]).row(vec![Value::Long(10)]);
        let payload = EnvelopeFixture::new(Status::Success)
            .table(first)
            .table(second)
            .encode();
        let mut response = Response::decode(&payload, DecodePolicy::Lazy).unwrap();

        assert_eq!(response.table_count(), 2);
        assert_eq!(response.table(0).unwrap().row_count(), 2);

        let mut n = 0i64;
        let table = response.table_mut(1).unwrap();
        table.decode_next_row_into(&mut [Slot::Long(&mut n)]).unwrap();
        assert_eq!(n, 10);

        let tables = response.into_tables();
        assert_eq!(tables[0].column_names().collect::<Vec<_>>(), vec!["s"]);
    }

    #[test]
    fn table_failure_aborts_response() {
        let good = TableFixture::new(0, &[(WireType::Int, "n")]).row(vec![Value::Int(1)]);
        let payload = EnvelopeFixture::new(Status::Success)
            .table(good)
            .result_count(2)
            .encode();

        assert!(matches!(
            Response::decode(&payload, DecodePolicy::Lazy),
            Err(ProtocolError::TableHeader {
                field: "total length",
                ..
            })
        ));
    }

    #[test]
    fn negative_exception_length() {
        let mut payload = EnvelopeFixture::new(Status::Success).exception(&[1, 2]).encode();
        // client data, fields, status, app status, latency, then the length.
        let at = 8 + 1 + 1 + 1 + 4;
        payload[at..at + 4].copy_from_slice(&(-2i32).to_be_bytes());

        assert!(matches!(
            Response::decode(&payload, DecodePolicy::Lazy),
            Err(ProtocolError::Envelope {
                field: "exception",
                source: WireError::InvalidLength(-2)
            })
        ));
    }

    #[test]
    fn negative_result_count() {
        let payload = EnvelopeFixture::new(Status::Success).result_count(-1).encode();

        assert!(matches!(
            Response::decode(&payload, DecodePolicy::Lazy),
            Err(ProtocolError::InvalidCount {
                field: "result count",
                value: -1
            })
        ));
    }

    #[test]
    fn truncated_status_message() {
        let payload = EnvelopeFixture::new(Status::Success)
            .status_message("hello")
            .encode();

        assert!(matches!(
            Response::decode(&payload[..14], DecodePolicy::Lazy),
            Err(ProtocolError::Envelope {
                field: "status message",
                ..
            })
        ));
    }
}
