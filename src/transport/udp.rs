//! UDP (User Datagram Protocol) implementation
//!
//! This module provides UDP datagram parsing, serialization and the
//! pseudo-header checksum of RFC 768.

use crate::error::{ensure_len, Error, Result};
use crate::network::checksum;
use crate::network::ipv4::{protocol, Ipv4Address};
use byteorder::{BigEndian, ByteOrder};

/// UDP header length in bytes
pub const UDP_HEADER_LEN: usize = 8;

/// UDP packet header structure
///
/// Represents the standard 8-byte UDP header as defined in RFC 768
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    pub src_port: u16,
    pub dst_port: u16,
    pub length: u16, // Length of UDP header and data
    pub checksum: u16,
}

impl UdpHeader {
    /// Parse UDP header from byte slice
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, UDP_HEADER_LEN)?;

        Ok(UdpHeader {
            src_port: BigEndian::read_u16(&data[0..2]),
            dst_port: BigEndian::read_u16(&data[2..4]),
            length: BigEndian::read_u16(&data[4..6]),
            checksum: BigEndian::read_u16(&data[6..8]),
        })
    }

    /// Convert UDP header to bytes
    pub fn to_bytes(&self) -> [u8; UDP_HEADER_LEN] {
        let mut bytes = [0u8; UDP_HEADER_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.src_port);
        BigEndian::write_u16(&mut bytes[2..4], self.dst_port);
        BigEndian::write_u16(&mut bytes[4..6], self.length);
        BigEndian::write_u16(&mut bytes[6..8], self.checksum);
        bytes
    }
}

/// A UDP datagram together with the remote IPv4 address.
///
/// For inbound datagrams `address` is the sender; for outbound ones it is the
/// destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpPacket {
    pub header: UdpHeader,
    pub payload: Vec<u8>,
    pub address: Ipv4Address,
}

impl UdpPacket {
    /// Creates a new UDP packet with the specified ports and payload. The
    /// checksum is left at zero ("not computed"), and the length saturates
    /// for oversized payloads until [`UdpPacket::with_checksum`] or
    /// [`UdpPacket::without_checksum`] rejects them.
    pub fn new(address: Ipv4Address, src_port: u16, dst_port: u16, payload: Vec<u8>) -> Self {
        UdpPacket {
            header: UdpHeader {
                src_port,
                dst_port,
                length: u16::try_from(UDP_HEADER_LEN + payload.len()).unwrap_or(u16::MAX),
                checksum: 0,
            },
            payload,
            address,
        }
    }

    /// Parse and validate a datagram carried from `source` to `destination`.
    ///
    /// A zero checksum is accepted without validation.
    pub fn from_bytes(data: &[u8], source: Ipv4Address, destination: Ipv4Address) -> Result<Self> {
        let header = UdpHeader::from_bytes(data)?;
        let length = header.length as usize;
        if length < UDP_HEADER_LEN {
            return Err(Error::InvalidLength);
        }
        ensure_len(data, length)?;

        let packet = UdpPacket {
            header,
            payload: data[UDP_HEADER_LEN..length].to_vec(),
            address: source,
        };

        if header.checksum != 0
            && packet.calculate_checksum(source, destination) != header.checksum
        {
            return Err(Error::InvalidChecksum);
        }

        Ok(packet)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(UDP_HEADER_LEN + self.payload.len());
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&self.payload);
        bytes
    }

    pub fn src_port(&self) -> u16 {
        self.header.src_port
    }

    pub fn dst_port(&self) -> u16 {
        self.header.dst_port
    }

    /// Checksum over the pseudo-header and the datagram, with the checksum
    /// field treated as zero.
    pub fn calculate_checksum(&self, source: Ipv4Address, destination: Ipv4Address) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[6] = 0;
        bytes[7] = 0;
        UdpUtils::calculate_udp_checksum(source, destination, &bytes)
    }

    /// Refresh the length field and fill in the checksum.
    pub fn with_checksum(
        mut self,
        source: Ipv4Address,
        destination: Ipv4Address,
    ) -> Result<Self> {
        self.update_length()?;
        self.header.checksum = self.calculate_checksum(source, destination);
        Ok(self)
    }

    /// Refresh the length field and mark the checksum as not computed.
    pub fn without_checksum(mut self) -> Result<Self> {
        self.update_length()?;
        self.header.checksum = 0;
        Ok(self)
    }

    fn update_length(&mut self) -> Result<()> {
        let size = UDP_HEADER_LEN + self.payload.len();
        self.header.length = u16::try_from(size).map_err(|_| Error::PayloadTooLarge {
            size,
            limit: u16::MAX as usize,
        })?;
        Ok(())
    }
}

pub struct UdpUtils {}

impl UdpUtils {
    /// Calculate UDP checksum with pseudo header
    pub fn calculate_udp_checksum(
        src_ip: Ipv4Address,
        dst_ip: Ipv4Address,
        udp_packet: &[u8],
    ) -> u16 {
        let udp_len = udp_packet.len() as u16;

        // IPv4 pseudo header: src_ip(4) + dst_ip(4) + zero(1) + protocol(1) + udp_len(2) = 12 bytes
        let mut pseudo_header = Vec::with_capacity(12 + udp_packet.len());
        pseudo_header.extend_from_slice(&src_ip.0);
        pseudo_header.extend_from_slice(&dst_ip.0);
        pseudo_header.push(0);
        pseudo_header.push(protocol::UDP);
        pseudo_header.extend_from_slice(&udp_len.to_be_bytes());
        pseudo_header.extend_from_slice(udp_packet);

        checksum(&pseudo_header)
    }
}
