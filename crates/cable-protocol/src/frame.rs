//! Frame header encoding/decoding
//!
//! Every frame is `header ‖ payload`. Byte 0 packs the packet type in
//! the high nibble, the count of extra length bytes in bits 3–2, and
//! the top two bits of the baseline length in bits 1–0; byte 1 holds
//! the low eight bits. Payloads longer than [`MID_FRAME_LEN`] extend
//! the length on the high side with up to three extra bytes.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::packet::PacketType;

/// Largest payload a short two-byte header can describe
pub const MID_FRAME_LEN: usize = 0x3FF;

/// Largest payload any header can describe
pub const MAX_FRAME_LEN: usize = 0x3FFF_FFFF;

/// Frame header carrying the packet type and payload length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Type of packet in the payload
    pub packet_type: PacketType,
    /// Length of the payload in bytes
    pub length: usize,
}

impl FrameHeader {
    /// Create a new frame header, validating the length bound
    pub fn new(packet_type: PacketType, length: usize) -> Result<Self, ProtocolError> {
        if length > MAX_FRAME_LEN {
            return Err(ProtocolError::PacketSizeTooLarge {
                size: length,
                max: MAX_FRAME_LEN,
            });
        }
        Ok(Self {
            packet_type,
            length,
        })
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        let ty = self.packet_type.as_u8() << 4;

        if self.length <= MID_FRAME_LEN {
            dst.put_u8(ty | (self.length >> 8) as u8);
            dst.put_u8(self.length as u8);
            return;
        }

        // Minimal big-endian serialization of the length.
        let be = (self.length as u32).to_be_bytes();
        let skip = be.iter().position(|b| *b != 0).unwrap_or(3);
        let bytes = &be[skip..];

        if bytes[0] <= 3 {
            // The most significant byte fits the two spare bits of byte 0.
            let extra = (bytes.len() - 2) as u8;
            dst.put_u8(ty | (extra << 2) | bytes[0]);
            dst.put_u8(bytes[1]);
            dst.put_slice(&bytes[2..]);
        } else {
            let extra = (bytes.len() - 1) as u8;
            dst.put_u8(ty | (extra << 2));
            dst.put_u8(bytes[0]);
            dst.put_slice(&bytes[1..]);
        }
    }

    /// Decode a header from the front of `src`, consuming it
    ///
    /// Returns `Ok(None)` when `src` holds too few bytes for the
    /// complete header. Returns `Err` on an unknown packet type or a
    /// length beyond [`MAX_FRAME_LEN`].
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < 2 {
            return Ok(None);
        }

        let byte0 = src[0];
        let extra = usize::from((byte0 >> 2) & 0x3);
        if src.len() < 2 + extra {
            return Ok(None);
        }

        let ty = byte0 >> 4;
        let packet_type =
            PacketType::from_u8(ty).ok_or(ProtocolError::UnknownPacketType(ty))?;

        src.advance(1);
        let mut length = (u64::from(byte0 & 0x3) << 8) | u64::from(src.get_u8());
        for _ in 0..extra {
            length = (length << 8) | u64::from(src.get_u8());
        }

        if length > MAX_FRAME_LEN as u64 {
            return Err(ProtocolError::PacketSizeTooLarge {
                size: length as usize,
                max: MAX_FRAME_LEN,
            });
        }

        Ok(Some(Self {
            packet_type,
            length: length as usize,
        }))
    }

    /// Bytes needed before the header at the front of `src` can decode
    pub(crate) fn required_len(src: &[u8]) -> usize {
        match src.first() {
            Some(byte0) => 2 + usize::from((byte0 >> 2) & 0x3),
            None => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(length: usize) -> (FrameHeader, usize) {
        let header = FrameHeader::new(PacketType::Message, length).unwrap();
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        let header_len = buf.len();
        let decoded = FrameHeader::decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        (decoded, header_len)
    }

    #[test]
    fn test_short_lengths() {
        for length in [0usize, 1, 255, 256, MID_FRAME_LEN] {
            let (decoded, header_len) = roundtrip(length);
            assert_eq!(decoded.length, length);
            assert_eq!(header_len, 2);
        }
    }

    #[test]
    fn test_long_lengths() {
        for length in [MID_FRAME_LEN + 1, 65535, 65536, 0xFF_FFFF, MAX_FRAME_LEN] {
            let (decoded, header_len) = roundtrip(length);
            assert_eq!(decoded.length, length, "length {length:#x}");
            assert!(header_len > 2 && header_len <= 5);
        }
    }

    #[test]
    fn test_length_over_max() {
        assert!(matches!(
            FrameHeader::new(PacketType::Message, MAX_FRAME_LEN + 1),
            Err(ProtocolError::PacketSizeTooLarge { .. })
        ));
    }

    #[test]
    fn test_header_bit_layout() {
        // len=1023 fills all ten baseline bits of a short header.
        let header = FrameHeader::new(PacketType::Connect, 1023).unwrap();
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[(1 << 4) | 0x03, 0xFF]);

        // len=1024 needs one extra byte; its high byte (4) no longer
        // fits the two spare bits of byte 0.
        let header = FrameHeader::new(PacketType::Connect, 1024).unwrap();
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        assert_eq!(buf.as_ref(), &[(1 << 4) | (1 << 2), 0x04, 0x00]);
    }

    #[test]
    fn test_insufficient_bytes() {
        let mut buf = BytesMut::from(&[0x34u8][..]);
        assert!(FrameHeader::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 1);

        // Long header advertising extra bytes that are not there yet.
        let mut buf = BytesMut::from(&[0x30u8 | (2 << 2), 0x00, 0x01][..]);
        assert!(FrameHeader::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_unknown_packet_type() {
        let mut buf = BytesMut::from(&[0xA0u8, 0x00][..]);
        assert!(matches!(
            FrameHeader::decode(&mut buf),
            Err(ProtocolError::UnknownPacketType(0x0A))
        ));
    }
}
