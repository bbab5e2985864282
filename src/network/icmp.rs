//! ICMP (Internet Control Message Protocol) implementation
//!
//! This module provides ICMP packet parsing and serialization.
//! Echo Request and Echo Reply bodies are decoded; every other message is
//! carried as opaque bytes.

use crate::error::{ensure_len, Error, Result};
use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};

/// ICMP header length in bytes (type, code, checksum)
const ICMP_HEADER_LEN: usize = 4;
/// Identifier and sequence number of an echo message
const ECHO_HEADER_LEN: usize = 4;

/// ICMP message types
pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;

/// ICMP message codes
pub const ICMP_CODE_ECHO: u8 = 0;

/// The header shared by all ICMP messages (RFC 792)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IcmpHeader {
    pub msg_type: u8,  // ICMP message type
    pub msg_code: u8,  // ICMP message code
    pub checksum: u16, // ICMP checksum, over the whole message
}

impl IcmpHeader {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, ICMP_HEADER_LEN)?;

        Ok(IcmpHeader {
            msg_type: data[0],
            msg_code: data[1],
            checksum: BigEndian::read_u16(&data[2..4]),
        })
    }

    pub fn to_bytes(&self) -> [u8; ICMP_HEADER_LEN] {
        let mut bytes = [0u8; ICMP_HEADER_LEN];
        bytes[0] = self.msg_type;
        bytes[1] = self.msg_code;
        BigEndian::write_u16(&mut bytes[2..4], self.checksum);
        bytes
    }
}

/// Body of an echo request or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Echo {
    pub identifier: u16,
    pub sequence: u16,
    pub payload: Vec<u8>,
}

impl Echo {
    /// Parse an echo body; the payload runs to the end of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, ECHO_HEADER_LEN)?;

        Ok(Echo {
            identifier: BigEndian::read_u16(&data[0..2]),
            sequence: BigEndian::read_u16(&data[2..4]),
            payload: data[ECHO_HEADER_LEN..].to_vec(),
        })
    }

    fn write_to(&self, bytes: &mut Vec<u8>) {
        let mut header = [0u8; ECHO_HEADER_LEN];
        BigEndian::write_u16(&mut header[0..2], self.identifier);
        BigEndian::write_u16(&mut header[2..4], self.sequence);
        bytes.extend_from_slice(&header);
        bytes.extend_from_slice(&self.payload);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IcmpMessage {
    EchoRequest(Echo),
    EchoReply(Echo),
    Unsupported { msg_type: u8, code: u8, data: Vec<u8> },
}

/// A complete ICMP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpPacket {
    pub checksum: u16,
    pub message: IcmpMessage,
}

impl IcmpPacket {
    pub fn echo_request(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        IcmpPacket {
            checksum: 0,
            message: IcmpMessage::EchoRequest(Echo {
                identifier,
                sequence,
                payload,
            }),
        }
        .with_checksum()
    }

    pub fn echo_reply(identifier: u16, sequence: u16, payload: Vec<u8>) -> Self {
        IcmpPacket {
            checksum: 0,
            message: IcmpMessage::EchoReply(Echo {
                identifier,
                sequence,
                payload,
            }),
        }
        .with_checksum()
    }

    /// Parse an ICMP message. The checksum is kept as received.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = IcmpHeader::from_bytes(data)?;
        let body = &data[ICMP_HEADER_LEN..];

        let message = match (header.msg_type, header.msg_code) {
            (ICMP_TYPE_ECHO_REQUEST, ICMP_CODE_ECHO) => {
                IcmpMessage::EchoRequest(Echo::from_bytes(body)?)
            }
            (ICMP_TYPE_ECHO_REPLY, ICMP_CODE_ECHO) => {
                IcmpMessage::EchoReply(Echo::from_bytes(body)?)
            }
            (msg_type, code) => IcmpMessage::Unsupported {
                msg_type,
                code,
                data: body.to_vec(),
            },
        };

        Ok(IcmpPacket {
            checksum: header.checksum,
            message,
        })
    }

    pub fn header(&self) -> IcmpHeader {
        let (msg_type, msg_code) = match &self.message {
            IcmpMessage::EchoRequest(_) => (ICMP_TYPE_ECHO_REQUEST, ICMP_CODE_ECHO),
            IcmpMessage::EchoReply(_) => (ICMP_TYPE_ECHO_REPLY, ICMP_CODE_ECHO),
            IcmpMessage::Unsupported { msg_type, code, .. } => (*msg_type, *code),
        };
        IcmpHeader {
            msg_type,
            msg_code,
            checksum: self.checksum,
        }
    }

    pub fn msg_type(&self) -> u8 {
        self.header().msg_type
    }

    /// Check if this is an Echo Request message
    pub fn is_echo_request(&self) -> bool {
        matches!(self.message, IcmpMessage::EchoRequest(_))
    }

    /// Check if this is an Echo Reply message
    pub fn is_echo_reply(&self) -> bool {
        matches!(self.message, IcmpMessage::EchoReply(_))
    }

    /// The echo body, or [`Error::UnsupportedIcmpPacket`] for other messages.
    pub fn echo(&self) -> Result<&Echo> {
        match &self.message {
            IcmpMessage::EchoRequest(echo) | IcmpMessage::EchoReply(echo) => Ok(echo),
            IcmpMessage::Unsupported { msg_type, code, .. } => Err(Error::UnsupportedIcmpPacket {
                icmp_type: *msg_type,
                code: *code,
            }),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header().to_bytes().to_vec();
        match &self.message {
            IcmpMessage::EchoRequest(echo) | IcmpMessage::EchoReply(echo) => {
                echo.write_to(&mut bytes)
            }
            IcmpMessage::Unsupported { data, .. } => bytes.extend_from_slice(data),
        }
        bytes
    }

    /// Checksum of the message with its checksum field treated as zero.
    pub fn calculate_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[2] = 0;
        bytes[3] = 0;
        checksum(&bytes)
    }

    /// A copy of the packet with the correct checksum.
    pub fn with_checksum(mut self) -> Self {
        self.checksum = self.calculate_checksum();
        self
    }
}
