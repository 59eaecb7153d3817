//! Fixed-width wire primitives.
//!
//! Every multi-byte value on the wire is big-endian. Integers are two's
//! complement, floats are the raw IEEE-754 bit pattern, and strings or byte
//! arrays carry a signed 32-bit length prefix followed by the raw bytes (no
//! padding, no terminator).
//!
//! Fixed-width values go through `bincode` with a big-endian, fixed-int
//! configuration, which produces exactly that layout. [`WireWriter`] appends
//! to an owned buffer; [`WireReader`] walks a borrowed slice and never hands
//! back partially-read data.
use std::string::FromUtf8Error;

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
    decode_from_slice, encode_into_std_write,
    error::{DecodeError, EncodeError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("buffer underflow: needed {needed} bytes, {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    #[error("invalid length prefix {0}")]
    InvalidLength(i32),

    #[error("value of {0} bytes does not fit a 32-bit length prefix")]
    TooLong(usize),

    #[error("string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    #[error("failed to encode value: {0}")]
    Encode(#[from] EncodeError),

    #[error("failed to decode value: {0}")]
    Decode(#[from] DecodeError),
}

fn wire_config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

/// Append-only encoder for outbound payloads.
#[derive(Debug)]
pub struct WireWriter {
    buf: Vec<u8>,
}

impl Default for WireWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl WireWriter {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    fn put<E: Encode>(&mut self, value: E) -> Result<(), WireError> {
        encode_into_std_write(value, &mut self.buf, wire_config())?;
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_i64(&mut self, value: i64) -> Result<(), WireError> {
        self.put(value)
    }

    pub fn write_f64(&mut self, value: f64) -> Result<(), WireError> {
        self.put(value)
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) -> Result<(), WireError> {
        self.write_bytes(value.as_bytes())
    }

    /// Writes a length-prefixed byte array.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), WireError> {
        let length = i32::try_from(value.len()).map_err(|_| WireError::TooLong(value.len()))?;
        self.write_i32(length)?;
        self.write_raw(value);
        Ok(())
    }

    /// Appends bytes verbatim, without a length prefix.
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.extend_from_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over an inbound payload.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn rest(&self) -> &'a [u8] {
        let buf: &'a [u8] = self.buf;
        &buf[self.pos..]
    }

    fn take<D: Decode<()>>(&mut self) -> Result<D, WireError> {
        let width = size_of::<D>();
        let rest = self.rest();
        if rest.len() < width {
            return Err(WireError::BufferUnderflow {
                needed: width,
                available: rest.len(),
            });
        }

        let (value, read) = decode_from_slice(&rest[..width], wire_config())?;
        self.pos += read;
        Ok(value)
    }

    /// Reads a single byte; any non-zero value is `true`.
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        Ok(self.read_i8()? != 0)
    }

    pub fn read_i8(&mut self) -> Result<i8, WireError> {
        self.take()
    }

    pub fn read_u8(&mut self) -> Result<u8, WireError> {
        self.take()
    }

    pub fn read_i16(&mut self) -> Result<i16, WireError> {
        self.take()
    }

    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        self.take()
    }

    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        self.take()
    }

    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        self.take()
    }

    /// Reads exactly `count` raw bytes.
    pub fn read_raw(&mut self, count: usize) -> Result<&'a [u8], WireError> {
        let rest = self.rest();
        if rest.len() < count {
            return Err(WireError::BufferUnderflow {
                needed: count,
                available: rest.len(),
            });
        }

        self.pos += count;
        Ok(&rest[..count])
    }

    /// Reads a length-prefixed byte array. On failure the reader is left
    /// where it started.
    pub fn read_bytes(&mut self) -> Result<&'a [u8], WireError> {
        let start = self.pos;
        let result = self.read_i32().and_then(|length| {
            let count = usize::try_from(length).map_err(|_| WireError::InvalidLength(length))?;
            self.read_raw(count)
        });

        if result.is_err() {
            self.pos = start;
        }
        result
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, WireError> {
        let start = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| {
            self.pos = start;
            WireError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        let mut writer = WireWriter::new();
        writer.write_i16(0x0102).unwrap();
        writer.write_i32(0x0304_0506).unwrap();
        writer.write_i64(-2).unwrap();

        assert_eq!(
            writer.as_slice(),
            &[
                0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe
            ]
        );
    }

    #[test]
    fn float_is_bit_pattern() {
        let mut writer = WireWriter::new();
        writer.write_f64(1.5).unwrap();

        assert_eq!(writer.as_slice(), &1.5f64.to_bits().to_be_bytes());

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_f64().unwrap().to_bits(), 1.5f64.to_bits());
    }

    #[test]
    fn nan_payload_survives() {
        let nan = f64::from_bits(0x7ff8_0000_dead_beef);
        let mut writer = WireWriter::new();
        writer.write_f64(nan).unwrap();

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_f64().unwrap().to_bits(), nan.to_bits());
    }

    #[test]
    fn string_is_length_prefixed() {
        let mut writer = WireWriter::new();
        writer.write_string("hello").unwrap();

        assert_eq!(writer.as_slice(), b"\x00\x00\x00\x05hello");

        let mut reader = WireReader::new(writer.as_slice());
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert!(reader.is_empty());
    }

    #[test]
    fn bool_is_single_byte() {
        let mut writer = WireWriter::new();
        writer.write_bool(true).unwrap();
        writer.write_bool(false).unwrap();
        assert_eq!(writer.as_slice(), &[1, 0]);

        let mut reader = WireReader::new(&[0x00, 0x07]);
        assert!(!reader.read_bool().unwrap());
        assert!(reader.read_bool().unwrap());
    }

    #[test]
    fn underflow_reports_sizes() {
        let mut reader = WireReader::new(&[0x00, 0x01]);
        let err = reader.read_i32().unwrap_err();

        assert!(matches!(
            err,
            WireError::BufferUnderflow {
                needed: 4,
                available: 2
            }
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn truncated_string_is_not_partially_read() {
        let mut reader = WireReader::new(b"\x00\x00\x00\x05hel");
        let err = reader.read_string().unwrap_err();

        assert!(matches!(
            err,
            WireError::BufferUnderflow {
                needed: 5,
                available: 3
            }
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut reader = WireReader::new(&[0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            reader.read_bytes(),
            Err(WireError::InvalidLength(-1))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut reader = WireReader::new(&[0x00, 0x00, 0x00, 0x02, 0xc3, 0x28]);
        assert!(matches!(
            reader.read_string(),
            Err(WireError::InvalidUtf8(_))
        ));
        assert_eq!(reader.position(), 0);
    }

    #[test]
    fn cursors_are_debuggable() {
        let mut writer = WireWriter::new();
        writer.write_i8(1).unwrap();
        let mut reader = WireReader::new(writer.as_slice());
        reader.read_i8().unwrap();

        assert_eq!(format!("{writer:?}"), "WireWriter { buf: [1] }");
        assert_eq!(
            format!("{:?}", reader.clone()),
            "WireReader { buf: [1], pos: 1 }"
        );
    }
}
