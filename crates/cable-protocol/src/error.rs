//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding cable frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A read required more bytes than the buffer holds
    #[error("Buffer too short: needed {needed} bytes, {remaining} remaining")]
    BufferTooShort { needed: usize, remaining: usize },

    /// A varint ran past its 10-byte budget without terminating
    #[error("Varint exceeds its 10-byte budget")]
    VarintOverflow,

    /// An integer does not fit the range of its wire representation
    #[error("Integer outside the range of its wire representation")]
    BigIntOverflow,

    /// A string field held invalid UTF-8
    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// A frame held fewer bytes than its header claims
    #[error("Invalid read length: expected {expected} bytes, got {actual}")]
    InvalidReadLen { expected: usize, actual: usize },

    /// Unknown packet type nibble
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(u8),

    /// Unknown value for a code field
    #[error("Unknown code value: {0}")]
    UnknownCode(u8),

    /// Payload exceeds the maximum a frame header can describe
    #[error("Packet size too large: {size} bytes exceeds maximum of {max} bytes")]
    PacketSizeTooLarge { size: usize, max: usize },

    /// Message kind does not fit its 6-bit field
    #[error("Message kind {0} does not fit in 6 bits")]
    MessageKindTooLarge(u8),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
