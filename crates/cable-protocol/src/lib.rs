//! cable-protocol: Wire format for the cable messaging protocol
//!
//! This crate defines the self-describing binary layout used between a
//! cable client and server over a persistent duplex byte stream: the
//! primitive codec, the two-regime frame header, and the nine packet
//! kinds with their property maps.

pub mod buffer;
pub mod codec;
pub mod error;
pub mod frame;
pub mod packet;
pub mod property;

pub use buffer::Buffer;
pub use codec::CableCodec;
pub use error::ProtocolError;
pub use frame::{FrameHeader, MAX_FRAME_LEN, MID_FRAME_LEN};
pub use packet::{
    CloseCode, ConnackCode, Identity, Packet, PacketType, Qos, StatusCode, MAX_MESSAGE_KIND,
    PROTOCOL_VERSION,
};
pub use property::{Properties, Property};
