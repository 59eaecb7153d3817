//! Server-side byte builders for tests.
use super::{FieldsPresent, Row, SessionInfo, Status, Value, WireType, wire::WireWriter};

pub(crate) fn login_success(session: &SessionInfo) -> Vec<u8> {
    let mut writer = WireWriter::new();
    writer.write_i8(0).unwrap();
    writer.write_i32(session.host_id).unwrap();
    writer.write_i64(session.connection_id).unwrap();
    writer.write_i64(1_690_000_000_000).unwrap();
    writer.write_i32(session.leader_address).unwrap();
    writer.write_string(&session.build_string).unwrap();
    writer.into_inner()
}

pub(crate) fn login_failure(code: i8) -> Vec<u8> {
    let mut writer = WireWriter::new();
    writer.write_i8(code).unwrap();
    writer.into_inner()
}

/// A table as the server would serialize it.
#[derive(Debug, Clone)]
pub(crate) struct TableFixture {
    status: i8,
    columns: Vec<(WireType, String)>,
    rows: Vec<Row>,
    row_bytes: Vec<Vec<u8>>,
}

impl TableFixture {
    pub(crate) fn new(status: i8, columns: &[(WireType, &str)]) -> Self {
        Self {
            status,
            columns: columns
                .iter()
                .map(|(kind, name)| (*kind, name.to_string()))
                .collect(),
            rows: Vec::new(),
            row_bytes: Vec::new(),
        }
    }

    pub(crate) fn row(mut self, values: Vec<Value>) -> Self {
        let mut body = WireWriter::new();
        for value in &values {
            value.encode_untagged(&mut body).unwrap();
        }
        self.row_bytes.push(body.into_inner());
        self.rows.push(Row::new(values));
        self
    }

    /// Adds a row body verbatim; it is not part of [`TableFixture::rows`].
    pub(crate) fn raw_row(mut self, body: Vec<u8>) -> Self {
        self.row_bytes.push(body);
        self
    }

    pub(crate) fn rows(&self) -> Vec<Row> {
        self.rows.clone()
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut metadata = WireWriter::new();
        metadata.write_i8(self.status).unwrap();
        metadata.write_i16(self.columns.len() as i16).unwrap();
        for (kind, _) in &self.columns {
            metadata.write_i8(kind.code()).unwrap();
        }
        for (_, name) in &self.columns {
            metadata.write_string(name).unwrap();
        }

        let mut rows = WireWriter::new();
        for body in &self.row_bytes {
            rows.write_bytes(body).unwrap();
        }

        let total = 4 + metadata.len() + 4 + rows.len();
        let mut writer = WireWriter::new();
        writer.write_i32(total as i32).unwrap();
        writer.write_i32(metadata.len() as i32).unwrap();
        writer.write_raw(metadata.as_slice());
        writer.write_i32(self.row_bytes.len() as i32).unwrap();
        writer.write_raw(rows.as_slice());
        writer.into_inner()
    }
}

/// A response envelope as the server would serialize it.
#[derive(Debug, Clone)]
pub(crate) struct EnvelopeFixture {
    client_data: i64,
    status: Status,
    status_message: Option<String>,
    app_status: i8,
    app_status_message: Option<String>,
    cluster_latency: i32,
    exception: Option<Vec<u8>>,
    result_count: Option<i16>,
    tables: Vec<TableFixture>,
}

impl EnvelopeFixture {
    pub(crate) fn new(status: Status) -> Self {
        Self {
            client_data: 0,
            status,
            status_message: None,
            app_status: i8::MIN,
            app_status_message: None,
            cluster_latency: 0,
            exception: None,
            result_count: None,
            tables: Vec::new(),
        }
    }

    pub(crate) fn client_data(mut self, value: i64) -> Self {
        self.client_data = value;
        self
    }

    pub(crate) fn status_message(mut self, message: &str) -> Self {
        self.status_message = Some(message.into());
        self
    }

    pub(crate) fn app_status(mut self, value: i8) -> Self {
        self.app_status = value;
        self
    }

    pub(crate) fn app_status_message(mut self, message: &str) -> Self {
        self.app_status_message = Some(message.into());
        self
    }

    pub(crate) fn cluster_latency(mut self, millis: i32) -> Self {
        self.cluster_latency = millis;
        self
    }

    pub(crate) fn exception(mut self, bytes: &[u8]) -> Self {
        self.exception = Some(bytes.to_vec());
        self
    }

    /// Overrides the declared table count.
    pub(crate) fn result_count(mut self, count: i16) -> Self {
        self.result_count = Some(count);
        self
    }

    pub(crate) fn table(mut self, table: TableFixture) -> Self {
        self.tables.push(table);
        self
    }

    pub(crate) fn encode(&self) -> Vec<u8> {
        let mut fields = FieldsPresent::empty();
        fields.set(FieldsPresent::STATUS_MESSAGE, self.status_message.is_some());
        fields.set(FieldsPresent::EXCEPTION, self.exception.is_some());
        fields.set(
            FieldsPresent::APP_STATUS_MESSAGE,
            self.app_status_message.is_some(),
        );

        let mut writer = WireWriter::new();
        writer.write_i64(self.client_data).unwrap();
        writer.write_u8(fields.bits()).unwrap();
        writer.write_i8(self.status.into()).unwrap();
        if let Some(message) = &self.status_message {
            writer.write_string(message).unwrap();
        }
        writer.write_i8(self.app_status).unwrap();
        if let Some(message) = &self.app_status_message {
            writer.write_string(message).unwrap();
        }
        writer.write_i32(self.cluster_latency).unwrap();
        if let Some(exception) = &self.exception {
            writer.write_bytes(exception).unwrap();
        }

        let count = self.result_count.unwrap_or(self.tables.len() as i16);
        writer.write_i16(count).unwrap();
        for table in &self.tables {
            writer.write_raw(&table.encode());
        }
        writer.into_inner()
    }
}
