//! Packet types for the cable protocol

use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::buffer::Buffer;
use crate::error::ProtocolError;
use crate::frame::FrameHeader;
use crate::property::Properties;

/// Protocol version carried in the Connect packet
pub const PROTOCOL_VERSION: u8 = 1;

/// Largest value of the 6-bit message kind field
pub const MAX_MESSAGE_KIND: u8 = 0x3F;

/// QoS bit of the Message flags byte
const FLAG_QOS: u8 = 0b1000_0000;
/// Dup bit of the Message flags byte
const FLAG_DUP: u8 = 0b0100_0000;

/// Packet type tag carried in the high nibble of the frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Handshake request (client to server)
    Connect = 1,
    /// Handshake result
    Connack = 2,
    /// Application message
    Message = 3,
    /// Message acknowledgment for QoS 1
    Messack = 4,
    /// Method call expecting a response
    Request = 5,
    /// Response to a request
    Response = 6,
    /// Liveness probe
    Ping = 7,
    /// Liveness reply
    Pong = 8,
    /// Terminal close frame
    Close = 9,
}

impl PacketType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Connect),
            2 => Some(Self::Connack),
            3 => Some(Self::Message),
            4 => Some(Self::Messack),
            5 => Some(Self::Request),
            6 => Some(Self::Response),
            7 => Some(Self::Ping),
            8 => Some(Self::Pong),
            9 => Some(Self::Close),
            _ => None,
        }
    }
}

/// Quality of service for Message delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Qos {
    /// Fire-and-forget
    #[default]
    AtMostOnce = 0,
    /// At-least-once, acknowledged by Messack
    AtLeastOnce = 1,
}

impl Qos {
    /// Convert to the flag bit value
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

/// Handshake result codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnackCode {
    /// Connection accepted
    Accepted = 0,
    /// Connection rejected
    Rejected = 1,
    /// Another client holds the same identity
    Duplicate = 2,
}

impl ConnackCode {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Accepted),
            1 => Some(Self::Rejected),
            2 => Some(Self::Duplicate),
            _ => None,
        }
    }
}

/// Close frame codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CloseCode {
    /// Normal shutdown
    Normal = 0,
    /// Endpoint is going away
    GoingAway = 1,
    /// Protocol violation
    ProtocolError = 2,
    /// Unsupported packet or feature
    Unsupported = 3,
    /// Authentication failure
    AuthFailure = 4,
    /// Internal server error
    ServerError = 5,
}

impl CloseCode {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::GoingAway),
            2 => Some(Self::ProtocolError),
            3 => Some(Self::Unsupported),
            4 => Some(Self::AuthFailure),
            5 => Some(Self::ServerError),
            _ => None,
        }
    }
}

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum StatusCode {
    /// Success
    Ok = 0,
    /// Malformed request
    BadRequest = 1,
    /// Caller is not authenticated
    Unauthorized = 2,
    /// Caller may not invoke this method
    Forbidden = 3,
    /// No such method
    NotFound = 4,
    /// The server gave up waiting
    Timeout = 5,
    /// No handler is available for the method
    Unavailable = 6,
    /// Handler failure
    Internal = 7,
}

impl StatusCode {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::BadRequest),
            2 => Some(Self::Unauthorized),
            3 => Some(Self::Forbidden),
            4 => Some(Self::NotFound),
            5 => Some(Self::Timeout),
            6 => Some(Self::Unavailable),
            7 => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Client identity presented in the Connect handshake
///
/// Any of the three fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID
    pub user_id: String,
    /// Client ID
    pub client_id: String,
    /// Password
    pub password: String,
}

impl Identity {
    /// Create a new identity
    pub fn new(
        user_id: impl Into<String>,
        client_id: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            client_id: client_id.into(),
            password: password.into(),
        }
    }
}

/// A cable packet
///
/// Every variant carries a property map except [`Packet::Close`],
/// which is a bare terminal frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Handshake request
    Connect {
        /// Protocol version, currently always [`PROTOCOL_VERSION`]
        version: u8,
        /// Credentials for this session
        identity: Identity,
        /// Extra handshake properties
        props: Properties,
    },

    /// Handshake result
    Connack {
        /// Result code
        code: ConnackCode,
        /// Server-assigned properties, e.g. [`crate::Property::ConnId`]
        props: Properties,
    },

    /// Application message
    Message {
        /// Sender-assigned ID; always 0 for QoS 0
        id: u16,
        /// Delivery guarantee
        qos: Qos,
        /// Set on every retransmission
        dup: bool,
        /// Application-defined subtype, at most [`MAX_MESSAGE_KIND`]
        kind: u8,
        /// Opaque payload, consuming the frame tail
        payload: Bytes,
        /// Message properties
        props: Properties,
    },

    /// Acknowledgment of a QoS-1 message
    Messack {
        /// ID of the acknowledged message
        id: u16,
        /// Ack properties
        props: Properties,
    },

    /// Method call expecting a response
    Request {
        /// Sender-assigned correlation ID
        id: u16,
        /// Method name
        method: String,
        /// Opaque body, consuming the frame tail
        body: Bytes,
        /// Request properties
        props: Properties,
    },

    /// Response to a request
    Response {
        /// Correlation ID of the request
        id: u16,
        /// Outcome
        code: StatusCode,
        /// Opaque body, consuming the frame tail
        body: Bytes,
        /// Response properties
        props: Properties,
    },

    /// Liveness probe
    Ping {
        /// Probe properties
        props: Properties,
    },

    /// Liveness reply
    Pong {
        /// Reply properties
        props: Properties,
    },

    /// Terminal close frame; carries no property map
    Close {
        /// Close reason
        code: CloseCode,
    },
}

impl Packet {
    /// Connect packet for the current protocol version
    pub fn connect(identity: Identity) -> Self {
        Self::Connect {
            version: PROTOCOL_VERSION,
            identity,
            props: Properties::new(),
        }
    }

    /// Messack for a received QoS-1 message
    pub fn messack(id: u16) -> Self {
        Self::Messack {
            id,
            props: Properties::new(),
        }
    }

    /// Ping with no properties
    pub fn ping() -> Self {
        Self::Ping {
            props: Properties::new(),
        }
    }

    /// Pong with no properties
    pub fn pong() -> Self {
        Self::Pong {
            props: Properties::new(),
        }
    }

    /// Response correlated to a request ID
    pub fn response(id: u16, code: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::Response {
            id,
            code,
            body: body.into(),
            props: Properties::new(),
        }
    }

    /// Get the packet type for this packet
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect { .. } => PacketType::Connect,
            Packet::Connack { .. } => PacketType::Connack,
            Packet::Message { .. } => PacketType::Message,
            Packet::Messack { .. } => PacketType::Messack,
            Packet::Request { .. } => PacketType::Request,
            Packet::Response { .. } => PacketType::Response,
            Packet::Ping { .. } => PacketType::Ping,
            Packet::Pong { .. } => PacketType::Pong,
            Packet::Close { .. } => PacketType::Close,
        }
    }

    /// Encode into a self-delimiting frame appended to `dst`
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let mut payload = Buffer::new();
        self.encode_payload(&mut payload)?;
        let header = FrameHeader::new(self.packet_type(), payload.len())?;
        header.encode(dst);
        dst.extend_from_slice(payload.as_slice());
        Ok(())
    }

    /// Encode into a standalone frame
    pub fn to_bytes(&self) -> Result<Bytes, ProtocolError> {
        let mut dst = BytesMut::new();
        self.encode(&mut dst)?;
        Ok(dst.freeze())
    }

    fn encode_payload(&self, buf: &mut Buffer) -> Result<(), ProtocolError> {
        match self {
            Packet::Connect {
                version,
                identity,
                props,
            } => {
                buf.write_u8(*version);
                buf.write_string(&identity.user_id);
                buf.write_string(&identity.client_id);
                buf.write_string(&identity.password);
                props.encode(buf)?;
            }

            Packet::Connack { code, props } => {
                buf.write_u8(code.as_u8());
                props.encode(buf)?;
            }

            Packet::Message {
                id,
                qos,
                dup,
                kind,
                payload,
                props,
            } => {
                if *kind > MAX_MESSAGE_KIND {
                    return Err(ProtocolError::MessageKindTooLarge(*kind));
                }
                let flags = (qos.as_u8() << 7) | (u8::from(*dup) << 6) | kind;
                buf.write_u8(flags);
                buf.write_u16(*id);
                // The property map precedes the payload so its leading
                // count self-delimits it; the payload takes the tail.
                props.encode(buf)?;
                buf.write_raw(payload);
            }

            Packet::Messack { id, props } => {
                buf.write_u16(*id);
                props.encode(buf)?;
            }

            Packet::Request {
                id,
                method,
                body,
                props,
            } => {
                buf.write_u16(*id);
                buf.write_string(method);
                props.encode(buf)?;
                buf.write_raw(body);
            }

            Packet::Response {
                id,
                code,
                body,
                props,
            } => {
                buf.write_u16(*id);
                buf.write_u8(code.as_u8());
                props.encode(buf)?;
                buf.write_raw(body);
            }

            Packet::Ping { props } | Packet::Pong { props } => {
                props.encode(buf)?;
            }

            Packet::Close { code } => {
                buf.write_u8(code.as_u8());
            }
        }
        Ok(())
    }

    /// Decode exactly one frame from the front of `src`
    ///
    /// Unlike the streaming [`crate::CableCodec`], a truncated frame is
    /// an error here, not a request for more data. This is the entry
    /// point for message-framed transports where every inbound chunk
    /// must hold whole frames.
    pub fn decode(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let header = match FrameHeader::decode(src)? {
            Some(header) => header,
            None => {
                return Err(ProtocolError::InvalidReadLen {
                    expected: FrameHeader::required_len(src),
                    actual: src.len(),
                })
            }
        };

        if src.len() < header.length {
            return Err(ProtocolError::InvalidReadLen {
                expected: header.length,
                actual: src.len(),
            });
        }

        let payload = src.split_to(header.length).freeze();
        Self::decode_payload(header.packet_type, payload)
    }

    /// Decode a packet payload whose frame header was already consumed
    pub(crate) fn decode_payload(
        packet_type: PacketType,
        payload: Bytes,
    ) -> Result<Self, ProtocolError> {
        let mut buf = Buffer::from_slice(&payload);

        let packet = match packet_type {
            PacketType::Connect => {
                let version = buf.read_u8()?;
                let user_id = buf.read_string()?;
                let client_id = buf.read_string()?;
                let password = buf.read_string()?;
                let props = Properties::decode(&mut buf)?;
                Packet::Connect {
                    version,
                    identity: Identity {
                        user_id,
                        client_id,
                        password,
                    },
                    props,
                }
            }

            PacketType::Connack => {
                let raw = buf.read_u8()?;
                let code =
                    ConnackCode::from_u8(raw).ok_or(ProtocolError::UnknownCode(raw))?;
                let props = Properties::decode(&mut buf)?;
                Packet::Connack { code, props }
            }

            PacketType::Message => {
                let flags = buf.read_u8()?;
                let id = buf.read_u16()?;
                let props = Properties::decode(&mut buf)?;
                let payload = buf.read_rest();
                let qos = if flags & FLAG_QOS != 0 {
                    Qos::AtLeastOnce
                } else {
                    Qos::AtMostOnce
                };
                Packet::Message {
                    id,
                    qos,
                    dup: flags & FLAG_DUP != 0,
                    kind: flags & MAX_MESSAGE_KIND,
                    payload,
                    props,
                }
            }

            PacketType::Messack => {
                let id = buf.read_u16()?;
                let props = Properties::decode(&mut buf)?;
                Packet::Messack { id, props }
            }

            PacketType::Request => {
                let id = buf.read_u16()?;
                let method = buf.read_string()?;
                let props = Properties::decode(&mut buf)?;
                let body = buf.read_rest();
                Packet::Request {
                    id,
                    method,
                    body,
                    props,
                }
            }

            PacketType::Response => {
                let id = buf.read_u16()?;
                let raw = buf.read_u8()?;
                let code =
                    StatusCode::from_u8(raw).ok_or(ProtocolError::UnknownCode(raw))?;
                let props = Properties::decode(&mut buf)?;
                let body = buf.read_rest();
                Packet::Response {
                    id,
                    code,
                    body,
                    props,
                }
            }

            PacketType::Ping => Packet::Ping {
                props: Properties::decode(&mut buf)?,
            },

            PacketType::Pong => Packet::Pong {
                props: Properties::decode(&mut buf)?,
            },

            PacketType::Close => {
                let raw = buf.read_u8()?;
                let code = CloseCode::from_u8(raw).ok_or(ProtocolError::UnknownCode(raw))?;
                Packet::Close { code }
            }
        };

        Ok(packet)
    }
}
