//! Login handshake.
//!
//! The client opens every connection with a login request naming the
//! service, the user and a SHA-1 digest of the password; the plaintext
//! password never leaves the process. The server answers with a one-byte
//! result code and, on success, an advertisement of the session it created.
use std::{fmt, net::Ipv4Addr};

use log::debug;
use sha1::{Digest, Sha1};

use super::{
    ProtocolError,
    wire::{WireError, WireReader, WireWriter},
};

/// Service selector sent at the start of every login.
pub const SERVICE_NAME: &str = "database";

/// Length of the SHA-1 password digest.
pub const PASSWORD_DIGEST_LEN: usize = 20;

/// Login result code for an accepted login.
pub const AUTH_OK: i8 = 0;

#[derive(Clone)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// SHA-1 of the plaintext password; the only form sent to the server.
    pub fn password_digest(&self) -> [u8; PASSWORD_DIGEST_LEN] {
        let digest = Sha1::digest(self.password.as_bytes());
        let mut out = [0; PASSWORD_DIGEST_LEN];
        out.copy_from_slice(&digest);
        out
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Values the server advertises after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub host_id: i32,
    pub connection_id: i64,
    pub leader_address: i32,
    pub build_string: String,
}

impl SessionInfo {
    /// The leader address as the IPv4 address it encodes.
    pub fn leader_ipv4(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.leader_address as u32)
    }
}

impl fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "host {} connection {} leader {} build '{}'",
            self.host_id,
            self.connection_id,
            self.leader_ipv4(),
            self.build_string
        )
    }
}

/// Builds the login request payload.
pub fn encode_login(credential: &Credential) -> Result<Vec<u8>, ProtocolError> {
    let mut writer = WireWriter::new();
    writer.write_string(SERVICE_NAME)?;
    writer.write_string(credential.username())?;
    writer.write_bytes(&credential.password_digest())?;
    Ok(writer.into_inner())
}

fn field(name: &'static str) -> impl FnOnce(WireError) -> ProtocolError {
    move |source| ProtocolError::Login {
        field: name,
        source,
    }
}

/// Parses the login response payload.
///
/// A non-zero result code fails before any further field is read. A success
/// body that ends early fails as a whole; no partial session is returned.
pub fn decode_login_response(payload: &[u8]) -> Result<SessionInfo, ProtocolError> {
    let mut reader = WireReader::new(payload);

    let code = reader.read_i8().map_err(field("authentication result"))?;
    if code != AUTH_OK {
        debug!("login rejected with code {code}");
        return Err(ProtocolError::AuthenticationFailed { code });
    }

    let host_id = reader.read_i32().map_err(field("host id"))?;
    let connection_id = reader.read_i64().map_err(field("connection id"))?;
    // Cluster start timestamp is not kept.
    reader.read_i64().map_err(field("cluster start"))?;
    let leader_address = reader.read_i32().map_err(field("leader address"))?;
    let build_string = reader.read_string().map_err(field("build string"))?;

    Ok(SessionInfo {
        host_id,
        connection_id,
        leader_address,
        build_string,
    })
}
