//! Authenticated, synchronous connections to a database node.
//!
//! A [`Connection`] owns one TCP socket and moves through three states:
//! `Unauthenticated` while the login handshake runs, `Ready` once the server
//! accepted it, and `Closed` after an explicit close, a timeout, a socket
//! error or a framing error. `Closed` is terminal. Calls are strictly
//! one-at-a-time: each call writes its request and blocks for the response.
use std::{
    fmt, io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use thiserror::Error;

use crate::protocol::{
    Credential, DecodePolicy, ProcedureCall, ProtocolError, ProtocolTransport, Response,
    SessionInfo, TransportError, Value, encode_frame,
    login::{decode_login_response, encode_login},
};

/// System procedure used by [`Connection::test_connection`].
pub const PING_PROCEDURE: &str = "@Ping";

/// Independent bounds on each blocking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect, shared by every resolved address.
    pub dial: Duration,
    /// Login request and response together.
    pub login: Duration,
    /// One call round trip.
    pub call: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            dial: Duration::from_secs(10),
            login: Duration::from_secs(10),
            call: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub timeouts: Timeouts,
    /// Row materialization used by [`Connection::call`].
    pub decode_policy: DecodePolicy,
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<(), ConnectionError> {
        let Timeouts { dial, login, call } = self.timeouts;
        for (name, value) in [("dial", dial), ("login", login), ("call", call)] {
            if value.is_zero() {
                return Err(ConnectionError::InvalidConfig(format!(
                    "{name} timeout must be non-zero"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unauthenticated,
    Ready,
    Closed,
}

/// The blocking operation an error happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Dial,
    Login,
    Call,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Dial => f.write_str("dial"),
            Operation::Login => f.write_str("login"),
            Operation::Call => f.write_str("call"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to connect to {address}: {source}")]
    Dial { address: String, source: io::Error },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: Operation, after: Duration },

    #[error("connection is closed")]
    Closed,

    #[error("IO error during {operation}: {source}")]
    Io {
        operation: Operation,
        source: io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid connection config: {0}")]
    InvalidConfig(String),

    #[error("'{0}' did not resolve to any address")]
    Unresolved(String),
}

impl ConnectionError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ConnectionError::Timeout { .. })
    }

    fn from_transport(e: TransportError, operation: Operation, after: Duration) -> Self {
        match e {
            TransportError::Timeout => ConnectionError::Timeout { operation, after },
            TransportError::Io(source) => ConnectionError::Io { operation, source },
            TransportError::Protocol(e) => ConnectionError::Protocol(e),
        }
    }
}

pub struct Connection {
    transport: ProtocolTransport<TcpStream>,
    config: ConnectionConfig,
    state: ConnectionState,
    session: Option<SessionInfo>,
    address: String,
}

impl Connection {
    /// Dials `address` and logs in with `credential`.
    ///
    /// Every address `address` resolves to is tried in turn until the dial
    /// timeout runs out. Any failure, including a rejected login, fails the
    /// whole attempt; there are no retries.
    pub fn connect(
        credential: &Credential,
        address: &str,
        config: ConnectionConfig,
    ) -> Result<Self, ConnectionError> {
        config.validate()?;

        let stream = dial(address, config.timeouts.dial)?;
        stream.set_nodelay(true).map_err(|source| ConnectionError::Io {
            operation: Operation::Dial,
            source,
        })?;

        let mut connection = Self {
            transport: ProtocolTransport::new(stream),
            config,
            state: ConnectionState::Unauthenticated,
            session: None,
            address: address.to_string(),
        };
        connection.login(credential)?;
        Ok(connection)
    }

    fn login(&mut self, credential: &Credential) -> Result<(), ConnectionError> {
        let timeout = self.config.timeouts.login;
        let deadline = Instant::now() + timeout;

        let request = encode_login(credential)?;
        let payload = self
            .transport
            .write_message(&request, deadline)
            .and_then(|()| self.transport.read_message(deadline))
            .map_err(|e| ConnectionError::from_transport(e, Operation::Login, timeout))?;
        let session = decode_login_response(&payload)?;

        info!(
            "logged in to {} as '{}': {session}",
            self.address,
            credential.username()
        );
        self.session = Some(session);
        self.state = ConnectionState::Ready;
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// What the server advertised at login.
    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// Invokes `procedure` and decodes the response with the connection's
    /// default policy.
    pub fn call(
        &mut self,
        procedure: &str,
        client_handle: i64,
        parameters: Vec<Value>,
    ) -> Result<Response, ConnectionError> {
        self.call_with_policy(procedure, client_handle, parameters, self.config.decode_policy)
    }

    pub fn call_with_policy(
        &mut self,
        procedure: &str,
        client_handle: i64,
        parameters: Vec<Value>,
        policy: DecodePolicy,
    ) -> Result<Response, ConnectionError> {
        let call = ProcedureCall::new(procedure, client_handle, parameters);
        self.invoke(&call, policy)
    }

    /// One synchronous round trip.
    ///
    /// Encoding failures send nothing and a response that arrives whole but
    /// fails to decode leaves the stream aligned; both keep the connection
    /// ready. Timeouts, socket errors and framing errors close it.
    pub fn invoke(
        &mut self,
        call: &ProcedureCall,
        policy: DecodePolicy,
    ) -> Result<Response, ConnectionError> {
        if self.state != ConnectionState::Ready {
            return Err(ConnectionError::Closed);
        }

        // Nothing has been written yet, so these failures leave the stream aligned.
        let request = encode_frame(&call.encode()?)?;
        let timeout = self.config.timeouts.call;
        let deadline = Instant::now() + timeout;

        debug!(
            "calling {} with {} parameters",
            call.name(),
            call.parameters().len()
        );
        let payload = match self
            .transport
            .write_frame(&request, deadline)
            .and_then(|()| self.transport.read_message(deadline))
        {
            Ok(payload) => payload,
            Err(e) => {
                let e = ConnectionError::from_transport(e, Operation::Call, timeout);
                warn!("closing connection to {}: {e}", self.address);
                self.close();
                return Err(e);
            }
        };

        Ok(Response::decode(&payload, policy)?)
    }

    /// Pings the server; `true` when it answered with success.
    pub fn test_connection(&mut self) -> Result<bool, ConnectionError> {
        let response = self.call(PING_PROCEDURE, 0, Vec::new())?;
        Ok(response.status().is_success())
    }

    /// Shuts the socket down. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }

        self.state = ConnectionState::Closed;
        if let Err(e) = self.transport.shutdown() {
            debug!("shutdown of {} failed: {e}", self.address);
        }
        info!("connection to {} closed", self.address);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.address)
            .field("state", &self.state)
            .field("session", &self.session)
            .finish()
    }
}

fn dial(address: &str, timeout: Duration) -> Result<TcpStream, ConnectionError> {
    let addrs = address
        .to_socket_addrs()
        .map_err(|source| ConnectionError::Dial {
            address: address.to_string(),
            source,
        })?;
    dial_any(address, addrs, timeout, Instant::now() + timeout)
}

/// Tries each address in turn; all attempts share one deadline.
fn dial_any(
    address: &str,
    addrs: impl IntoIterator<Item = SocketAddr>,
    timeout: Duration,
    deadline: Instant,
) -> Result<TcpStream, ConnectionError> {
    let timed_out = ConnectionError::Timeout {
        operation: Operation::Dial,
        after: timeout,
    };

    let mut last_error = None;
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(timed_out);
        }

        match TcpStream::connect_timeout(&addr, remaining) {
            Ok(stream) => {
                debug!("connected to {addr}");
                return Ok(stream);
            }
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if e.kind() == io::ErrorKind::TimedOut => Err(timed_out),
        Some(source) => Err(ConnectionError::Dial {
            address: address.to_string(),
            source,
        }),
        None => Err(ConnectionError::Unresolved(address.to_string())),
    }
}
