//! Growable byte buffer with explicit read and write cursors
//!
//! All multi-byte integers are big-endian on the wire. Reads are
//! bounds-checked and fail with [`ProtocolError::BufferTooShort`]
//! instead of panicking. Variable-length integers use unsigned
//! LEB128: seven payload bits per byte, high bit as continuation.

use std::collections::HashMap;

use bytes::Bytes;

use crate::error::ProtocolError;

/// Maximum encoded size of a varint (unsigned LEB128 over 64 bits)
pub const MAX_VARINT_LEN: usize = 10;

/// Byte buffer presenting both an encoder and a decoder view
///
/// Writes append at the end and grow the backing storage
/// geometrically; reads consume from a separate cursor at the front.
#[derive(Debug, Clone, Default)]
pub struct Buffer {
    data: Vec<u8>,
    read: usize,
}

impl Buffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with pre-allocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            read: 0,
        }
    }

    /// Decoder view over inbound bytes
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            read: 0,
        }
    }

    /// Total number of bytes written
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no bytes at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of unread bytes between the read cursor and the end
    pub fn remaining(&self) -> usize {
        self.data.len() - self.read
    }

    /// All written bytes, regardless of the read cursor
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consume the buffer into its written bytes
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.data)
    }

    fn take(&mut self, needed: usize) -> Result<&[u8], ProtocolError> {
        if self.remaining() < needed {
            return Err(ProtocolError::BufferTooShort {
                needed,
                remaining: self.remaining(),
            });
        }
        let start = self.read;
        self.read += needed;
        Ok(&self.data[start..self.read])
    }

    // Writers

    /// Append a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.data.push(value);
    }

    /// Append a signed byte (two's complement)
    pub fn write_i8(&mut self, value: i8) {
        self.data.push(value as u8);
    }

    /// Append a big-endian u16
    pub fn write_u16(&mut self, value: u16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian i16
    pub fn write_i16(&mut self, value: i16) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian u32
    pub fn write_u32(&mut self, value: u32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian i32
    pub fn write_i32(&mut self, value: i32) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian u64
    pub fn write_u64(&mut self, value: u64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a big-endian i64
    pub fn write_i64(&mut self, value: i64) {
        self.data.extend_from_slice(&value.to_be_bytes());
    }

    /// Append a bool as a single `0`/`1` byte
    pub fn write_bool(&mut self, value: bool) {
        self.data.push(u8::from(value));
    }

    /// Append an unsigned LEB128 varint
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let byte = (value & 0x7F) as u8;
            value >>= 7;
            if value == 0 {
                self.data.push(byte);
                return;
            }
            self.data.push(byte | 0x80);
        }
    }

    /// Append a varint length prefix followed by the raw bytes
    pub fn write_data(&mut self, data: &[u8]) {
        self.write_varint(data.len() as u64);
        self.data.extend_from_slice(data);
    }

    /// Append a length-prefixed UTF-8 string
    pub fn write_string(&mut self, value: &str) {
        self.write_data(value.as_bytes());
    }

    /// Append a varint count followed by that many strings
    pub fn write_string_list(&mut self, items: &[String]) {
        self.write_varint(items.len() as u64);
        for item in items {
            self.write_string(item);
        }
    }

    /// Append a varint count followed by that many string pairs
    pub fn write_string_map(&mut self, map: &HashMap<String, String>) {
        self.write_varint(map.len() as u64);
        for (key, value) in map {
            self.write_string(key);
            self.write_string(value);
        }
    }

    /// Append a one-byte count followed by that many `(u8, string)` pairs
    ///
    /// The count byte bounds the map to 255 entries; larger maps fail
    /// with [`ProtocolError::BigIntOverflow`].
    pub fn write_byte_map(&mut self, map: &HashMap<u8, String>) -> Result<(), ProtocolError> {
        let count = u8::try_from(map.len()).map_err(|_| ProtocolError::BigIntOverflow)?;
        self.write_u8(count);
        for (key, value) in map {
            self.write_u8(*key);
            self.write_string(value);
        }
        Ok(())
    }

    /// Append raw bytes with no framing
    pub fn write_raw(&mut self, data: &[u8]) {
        self.data.extend_from_slice(data);
    }

    // Readers

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    /// Read a signed byte (two's complement)
    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        Ok(self.take(1)?[0] as i8)
    }

    /// Read a big-endian u16
    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian i16
    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(i16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Read a big-endian u32
    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian i32
    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        let bytes = self.take(4)?;
        Ok(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a big-endian u64
    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    /// Read a big-endian i64
    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        let bytes = self.take(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(raw))
    }

    /// Read a bool
    ///
    /// Exactly `1` decodes to `true`; every other byte value decodes
    /// to `false`. This mirrors the wire policy of the protocol.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? == 1)
    }

    /// Read an unsigned LEB128 varint
    pub fn read_varint(&mut self) -> Result<u64, ProtocolError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        for _ in 0..MAX_VARINT_LEN {
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        Err(ProtocolError::VarintOverflow)
    }

    fn read_len(&mut self) -> Result<usize, ProtocolError> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| ProtocolError::BigIntOverflow)
    }

    /// Read a varint length prefix followed by that many raw bytes
    pub fn read_data(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.read_len()?;
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, ProtocolError> {
        Ok(String::from_utf8(self.read_data()?)?)
    }

    /// Read a varint count followed by that many strings
    pub fn read_string_list(&mut self) -> Result<Vec<String>, ProtocolError> {
        let count = self.read_len()?;
        let mut items = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            items.push(self.read_string()?);
        }
        Ok(items)
    }

    /// Read a varint count followed by that many string pairs
    pub fn read_string_map(&mut self) -> Result<HashMap<String, String>, ProtocolError> {
        let count = self.read_len()?;
        let mut map = HashMap::with_capacity(count.min(64));
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Read a one-byte count followed by that many `(u8, string)` pairs
    pub fn read_byte_map(&mut self) -> Result<HashMap<u8, String>, ProtocolError> {
        let count = usize::from(self.read_u8()?);
        let mut map = HashMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_u8()?;
            let value = self.read_string()?;
            map.insert(key, value);
        }
        Ok(map)
    }

    /// Consume every remaining unread byte
    pub fn read_rest(&mut self) -> Bytes {
        let rest = Bytes::copy_from_slice(&self.data[self.read..]);
        self.read = self.data.len();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsigned_roundtrip() {
        let mut buf = Buffer::new();
        for value in [0u8, 1, 127, 255] {
            buf.write_u8(value);
            assert_eq!(buf.read_u8().unwrap(), value);
        }
        for value in [0u16, 255, 256, 65535] {
            buf.write_u16(value);
            assert_eq!(buf.read_u16().unwrap(), value);
        }
        for value in [0u32, 65535, 65536, u32::MAX / 2] {
            buf.write_u32(value);
            assert_eq!(buf.read_u32().unwrap(), value);
        }
        for value in [0u64, u64::from(u32::MAX), 1 << 63, u64::MAX] {
            buf.write_u64(value);
            assert_eq!(buf.read_u64().unwrap(), value);
        }
    }

    #[test]
    fn test_signed_roundtrip() {
        let mut buf = Buffer::new();
        for value in [i8::MIN, -1, 0, 1, i8::MAX] {
            buf.write_i8(value);
            assert_eq!(buf.read_i8().unwrap(), value);
        }
        for value in [i16::MIN, -1, 0, i16::MAX] {
            buf.write_i16(value);
            assert_eq!(buf.read_i16().unwrap(), value);
        }
        for value in [i32::MIN, -1, 0, i32::MAX] {
            buf.write_i32(value);
            assert_eq!(buf.read_i32().unwrap(), value);
        }
        for value in [i64::MIN, -1, 0, i64::MAX] {
            buf.write_i64(value);
            assert_eq!(buf.read_i64().unwrap(), value);
        }
    }

    #[test]
    fn test_big_endian_layout() {
        let mut buf = Buffer::new();
        buf.write_u16(0x0102);
        buf.write_u32(0x0304_0506);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_bool_policy() {
        let mut buf = Buffer::new();
        buf.write_bool(true);
        buf.write_bool(false);
        assert_eq!(buf.as_slice(), &[1, 0]);
        assert!(buf.read_bool().unwrap());
        assert!(!buf.read_bool().unwrap());

        // Only exactly 1 reads back as true.
        let mut buf = Buffer::from_slice(&[2]);
        assert!(!buf.read_bool().unwrap());
    }

    #[test]
    fn test_varint_roundtrip() {
        for value in [0u64, 1, 127, 128, 16383, 16384, 1 << 28, u64::MAX] {
            let mut buf = Buffer::new();
            buf.write_varint(value);
            assert_eq!(buf.read_varint().unwrap(), value);
        }
    }

    #[test]
    fn test_varint_encoded_sizes() {
        let cases = [(0u64, 1usize), (127, 1), (128, 2), (16383, 2), (16384, 3), (1 << 28, 5)];
        for (value, size) in cases {
            let mut buf = Buffer::new();
            buf.write_varint(value);
            assert_eq!(buf.len(), size, "varint {value}");
        }
    }

    #[test]
    fn test_varint_overflow() {
        let mut buf = Buffer::from_slice(&[0xFF; 10]);
        assert!(matches!(
            buf.read_varint(),
            Err(ProtocolError::VarintOverflow)
        ));
    }

    #[test]
    fn test_buffer_too_short() {
        let mut buf = Buffer::from_slice(&[1, 2]);
        let err = buf.read_u32().unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::BufferTooShort {
                needed: 4,
                remaining: 2
            }
        ));
    }

    #[test]
    fn test_data_and_string_roundtrip() {
        let mut buf = Buffer::new();
        buf.write_data(b"payload");
        buf.write_string("caf\u{e9}");
        buf.write_string("");
        assert_eq!(buf.read_data().unwrap(), b"payload");
        assert_eq!(buf.read_string().unwrap(), "caf\u{e9}");
        assert_eq!(buf.read_string().unwrap(), "");
    }

    #[test]
    fn test_string_list_roundtrip() {
        let items = vec!["a".to_string(), "".to_string(), "long-ish entry".to_string()];
        let mut buf = Buffer::new();
        buf.write_string_list(&items);
        assert_eq!(buf.read_string_list().unwrap(), items);
    }

    #[test]
    fn test_string_map_roundtrip() {
        let mut map = HashMap::new();
        map.insert("user".to_string(), "u1".to_string());
        map.insert("channel".to_string(), "general".to_string());
        let mut buf = Buffer::new();
        buf.write_string_map(&map);
        assert_eq!(buf.read_string_map().unwrap(), map);
    }

    #[test]
    fn test_byte_map_roundtrip() {
        let mut map = HashMap::new();
        map.insert(1u8, "x".to_string());
        map.insert(5u8, "secret".to_string());
        let mut buf = Buffer::new();
        buf.write_byte_map(&map).unwrap();
        assert_eq!(buf.read_byte_map().unwrap(), map);
    }

    #[test]
    fn test_byte_map_count_bound() {
        // 256 entries do not fit the one-byte count.
        let mut map: HashMap<u8, String> = (0..=255u8).map(|k| (k, String::new())).collect();
        let mut buf = Buffer::new();
        assert!(matches!(
            buf.write_byte_map(&map),
            Err(ProtocolError::BigIntOverflow)
        ));
        map.remove(&255);
        assert!(buf.write_byte_map(&map).is_ok());
    }

    #[test]
    fn test_read_rest() {
        let mut buf = Buffer::from_slice(&[1, 2, 3, 4]);
        buf.read_u16().unwrap();
        assert_eq!(buf.read_rest().as_ref(), &[3, 4]);
        assert_eq!(buf.remaining(), 0);
    }
}
