//! Message envelope: `[i32 length][i8 version][payload]`.
use log::trace;

use super::{
    ProtocolError,
    wire::{WireReader, WireWriter},
};

/// The only wire protocol version this client speaks.
pub const PROTOCOL_VERSION: i8 = 1;

/// Upper bound on a single frame's declared length (version byte included).
pub const MAX_FRAME_LENGTH: usize = 50 * 1024 * 1024;

pub(crate) const LENGTH_FIELD_SIZE: usize = size_of::<i32>();
pub(crate) const HEADER_SIZE: usize = LENGTH_FIELD_SIZE + size_of::<i8>();

/// Wraps `payload` in an envelope.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let length = payload.len() + 1;
    if length > MAX_FRAME_LENGTH {
        return Err(ProtocolError::FrameTooLarge {
            length,
            max: MAX_FRAME_LENGTH,
        });
    }

    let mut writer = WireWriter::with_capacity(HEADER_SIZE + payload.len());
    // MAX_FRAME_LENGTH fits an i32.
    writer.write_i32(length as i32)?;
    writer.write_i8(PROTOCOL_VERSION)?;
    writer.write_raw(payload);

    trace!("framed {} byte payload", payload.len());
    Ok(writer.into_inner())
}

/// Validates a declared frame length and returns the number of bytes that
/// follow the length field.
pub(crate) fn body_length(declared: i32) -> Result<usize, ProtocolError> {
    let length = usize::try_from(declared)
        .ok()
        .filter(|l| *l >= 1)
        .ok_or(ProtocolError::FrameLength(declared))?;

    if length > MAX_FRAME_LENGTH {
        return Err(ProtocolError::FrameTooLarge {
            length,
            max: MAX_FRAME_LENGTH,
        });
    }
    Ok(length)
}

pub(crate) fn check_version(version: i8) -> Result<(), ProtocolError> {
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }
    Ok(())
}

/// Unwraps a complete in-memory envelope and returns its payload.
///
/// The buffer must hold exactly one frame: fewer bytes than declared is a
/// truncation, more is trailing garbage and reported the same way.
pub fn decode_frame(bytes: &[u8]) -> Result<&[u8], ProtocolError> {
    let mut reader = WireReader::new(bytes);
    let declared = reader.read_i32().map_err(|_| ProtocolError::FrameTruncated {
        expected: LENGTH_FIELD_SIZE,
        actual: bytes.len(),
    })?;

    let length = body_length(declared)?;
    if reader.remaining() != length {
        return Err(ProtocolError::FrameTruncated {
            expected: length,
            actual: reader.remaining(),
        });
    }

    check_version(reader.read_i8()?)?;
    Ok(reader.read_raw(length - 1)?)
}
