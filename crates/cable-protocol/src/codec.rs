//! Tokio codec for framed cable packets

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::FrameHeader;
use crate::packet::Packet;

/// Codec for encoding/decoding cable frames over a byte stream
///
/// The decoder tolerates partial reads: a frame split across inbound
/// chunks is reassembled through the pending-header state.
#[derive(Debug, Default)]
pub struct CableCodec {
    /// Current header being decoded (if any)
    pending_header: Option<FrameHeader>,
}

impl CableCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            pending_header: None,
        }
    }
}

impl Decoder for CableCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Try to decode a header if we don't have one yet
        let header = match self.pending_header.take() {
            Some(header) => header,
            None => match FrameHeader::decode(src)? {
                Some(header) => header,
                None => return Ok(None), // Need more data
            },
        };

        // Check if we have enough data for the payload
        if src.len() < header.length {
            // Save header and wait for more data
            self.pending_header = Some(header);
            return Ok(None);
        }

        let payload = src.split_to(header.length).freeze();
        Packet::decode_payload(header.packet_type, payload).map(Some)
    }
}

impl Encoder<Packet> for CableCodec {
    type Error = ProtocolError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), Self::Error> {
        packet.encode(dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{Identity, Qos, StatusCode};
    use crate::property::Properties;
    use bytes::Bytes;

    #[test]
    fn test_codec_roundtrip() {
        let mut codec = CableCodec::new();
        let packet = Packet::connect(Identity::new("user", "client", "pw"));

        let mut buf = BytesMut::new();
        codec.encode(packet.clone(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, packet);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = CableCodec::new();
        let packet = Packet::Message {
            id: 12,
            qos: Qos::AtLeastOnce,
            dup: false,
            kind: 7,
            payload: Bytes::from_static(b"hello"),
            props: Properties::new(),
        };

        let mut full_buf = BytesMut::new();
        codec.encode(packet.clone(), &mut full_buf).unwrap();

        // Split mid-payload to simulate a partial read
        let mut partial = full_buf.split_to(4);

        // Should return None (need more data)
        assert!(codec.decode(&mut partial).unwrap().is_none());

        // Add the rest
        partial.extend_from_slice(&full_buf);

        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn test_codec_back_to_back_frames() {
        let mut codec = CableCodec::new();
        let first = Packet::messack(1);
        let second = Packet::response(2, StatusCode::Ok, Bytes::from_static(b"ok"));

        let mut buf = BytesMut::new();
        codec.encode(first.clone(), &mut buf).unwrap();
        codec.encode(second.clone(), &mut buf).unwrap();

        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), first);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), second);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
