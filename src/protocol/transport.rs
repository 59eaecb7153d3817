use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    time::{Duration, Instant},
};

use log::trace;
use thiserror::Error;

use super::{
    ProtocolError,
    frame::{self, LENGTH_FIELD_SIZE},
    wire::WireReader,
};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport deadline elapsed")]
    Timeout,
    #[error("transport IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// A byte stream whose blocking reads and writes can be bounded.
pub trait TimedStream: Read + Write {
    /// Bounds the next blocking reads and writes; `None` waits forever.
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Closes both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl TimedStream for TcpStream {
    fn set_io_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)?;
        self.set_write_timeout(timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

/// Moves whole frames over a [`TimedStream`], with every operation bounded
/// by an absolute deadline.
pub struct ProtocolTransport<T: TimedStream> {
    stream: T,
}

impl<T: TimedStream> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self { stream }
    }

    pub fn get_ref(&self) -> &T {
        &self.stream
    }

    pub fn into_inner(self) -> T {
        self.stream
    }

    /// Arms the stream with whatever is left before `deadline`.
    fn arm(&mut self, deadline: Instant) -> Result<(), TransportError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(TransportError::Timeout);
        }
        self.stream.set_io_timeout(Some(remaining))?;
        Ok(())
    }

    /// Frames `payload` and writes it in a single buffer.
    pub fn write_message(&mut self, payload: &[u8], deadline: Instant) -> Result<(), TransportError> {
        let message = frame::encode_frame(payload)?;
        self.write_frame(&message, deadline)
    }

    /// Writes an envelope already built by [`frame::encode_frame`].
    pub fn write_frame(&mut self, message: &[u8], deadline: Instant) -> Result<(), TransportError> {
        self.arm(deadline)?;

        match self.stream.write_all(message).and_then(|()| self.stream.flush()) {
            Ok(()) => {
                trace!("wrote {} byte frame", message.len());
                Ok(())
            }
            Err(e) if is_timeout(&e) => Err(TransportError::Timeout),
            Err(e) => Err(e.into()),
        }
    }

    /// Reads one frame, validates its version and returns the payload.
    pub fn read_message(&mut self, deadline: Instant) -> Result<Vec<u8>, TransportError> {
        let mut header = [0; LENGTH_FIELD_SIZE];
        self.read_exact_by(&mut header, deadline)?;

        let declared = WireReader::new(&header)
            .read_i32()
            .map_err(ProtocolError::from)?;
        let length = frame::body_length(declared)?;

        let mut body = vec![0; length];
        self.read_exact_by(&mut body, deadline)?;
        frame::check_version(body[0] as i8)?;

        trace!("read {length} byte frame");
        Ok(body.split_off(1))
    }

    fn read_exact_by(&mut self, buf: &mut [u8], deadline: Instant) -> Result<(), TransportError> {
        let mut filled = 0;
        while filled < buf.len() {
            self.arm(deadline)?;
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into()),
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if is_timeout(&e) => return Err(TransportError::Timeout),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown()
    }
}

#[cfg(test)]
impl TimedStream for io::Cursor<Vec<u8>> {
    fn set_io_timeout(&mut self, _: Option<Duration>) -> io::Result<()> {
        Ok(())
    }

    fn shutdown(&mut self) -> io::Result<()> {
        Ok(())
    }
}
