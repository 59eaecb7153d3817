//! Stored procedure invocations: procedure name, client handle and tagged
//! parameters.
use super::{
    ProtocolError,
    types::Value,
    wire::{WireError, WireReader, WireWriter},
};

/// A stored procedure invocation.
///
/// The client handle is echoed back in the response. A purely synchronous
/// caller can leave it at `0`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    name: String,
    client_handle: i64,
    parameters: Vec<Value>,
}

impl ProcedureCall {
    pub fn new(name: impl Into<String>, client_handle: i64, parameters: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            client_handle,
            parameters,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_handle(&self) -> i64 {
        self.client_handle
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    /// Serializes the call payload. Any unsupported parameter fails the
    /// whole call and nothing is returned.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let count = i16::try_from(self.parameters.len())
            .map_err(|_| ProtocolError::TooManyParameters(self.parameters.len()))?;

        let mut writer = WireWriter::new();
        writer.write_string(&self.name)?;
        writer.write_i64(self.client_handle)?;
        writer.write_i16(count)?;
        for param in &self.parameters {
            param.encode_tagged(&mut writer)?;
        }

        Ok(writer.into_inner())
    }

    /// Parses a call payload, as a server or a recording proxy sees it.
    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        fn field(name: &'static str) -> impl FnOnce(WireError) -> ProtocolError {
            move |source| ProtocolError::Call {
                field: name,
                source,
            }
        }

        let mut reader = WireReader::new(payload);
        let name = reader.read_string().map_err(field("procedure name"))?;
        let client_handle = reader.read_i64().map_err(field("client handle"))?;
        let count = reader.read_i16().map_err(field("parameter count"))?;
        let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidCount {
            field: "parameter count",
            value: i64::from(count),
        })?;

        let parameters = (0..count)
            .map(|_| Value::decode_tagged(&mut reader))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            client_handle,
            parameters,
        })
    }
}
