//! Property keys and the per-packet property map

use std::collections::HashMap;

use crate::buffer::Buffer;
use crate::error::ProtocolError;

/// Well-known property keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Property {
    /// Connection ID assigned by the server
    ConnId = 1,
    /// User ID
    UserId = 2,
    /// Channel name
    Channel = 3,
    /// Client ID
    ClientId = 4,
    /// Password
    Password = 5,
}

impl Property {
    /// Convert to the wire key byte
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from the wire key byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::ConnId),
            2 => Some(Self::UserId),
            3 => Some(Self::Channel),
            4 => Some(Self::ClientId),
            5 => Some(Self::Password),
            _ => None,
        }
    }
}

/// Property map attached to every packet except Close
///
/// Serialized with a one-byte entry count, so it holds at most 255
/// entries. Keys outside the [`Property`] set are preserved so they
/// round-trip through a decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(HashMap<u8, String>);

impl Properties {
    /// Create an empty property map
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a well-known property
    pub fn get(&self, key: Property) -> Option<&str> {
        self.0.get(&key.as_u8()).map(String::as_str)
    }

    /// Insert a well-known property, returning the previous value
    pub fn insert(&mut self, key: Property, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.as_u8(), value.into())
    }

    /// Insert a raw-keyed property
    pub fn insert_raw(&mut self, key: u8, value: impl Into<String>) -> Option<String> {
        self.0.insert(key, value.into())
    }

    /// Builder-style insert
    pub fn with(mut self, key: Property, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over raw `(key, value)` entries
    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub(crate) fn encode(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        buf.write_byte_map(&self.0)
    }

    pub(crate) fn decode(buf: &mut Buffer) -> Result<Self, ProtocolError> {
        Ok(Self(buf.read_byte_map()?))
    }
}
