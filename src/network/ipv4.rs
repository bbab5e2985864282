//! IPv4 protocol implementation
//!
//! This module provides IPv4 packet parsing, validation, and serialization.
//!
//! Headers come in two forms:
//! - [`RawIpv4Header`]: the fixed 20-byte record exactly as it sits on the wire
//! - [`Ipv4Header`]: the logical header, with version/IHL and flags/fragment
//!   offset split apart and the variable options attached

use crate::error::{ensure_len, Error, Result};
use crate::network::checksum;
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub const IPV4_HEADER_LEN: usize = 20;
pub const IPV4_VERSION: u8 = 4;
const DEFAULT_IHL: u8 = 5; // 5 * 4 = 20 bytes (standard header length)
pub const DEFAULT_TTL: u8 = 64;

/// A 32-bit IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Ipv4Address(pub [u8; 4]);

impl Ipv4Address {
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0; 4]);
    /// Limited broadcast, 255.255.255.255
    pub const BROADCAST: Ipv4Address = Ipv4Address([255; 4]);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address([a, b, c, d])
    }

    pub fn octets(&self) -> [u8; 4] {
        self.0
    }

    /// Bitwise AND with a netmask.
    pub fn mask(&self, netmask: Ipv4Address) -> Ipv4Address {
        Ipv4Address((u32::from(*self) & u32::from(netmask)).to_be_bytes())
    }

    /// The directed broadcast address of this address's subnet.
    pub fn directed_broadcast(&self, netmask: Ipv4Address) -> Ipv4Address {
        Ipv4Address((u32::from(*self) | !u32::from(netmask)).to_be_bytes())
    }

    pub fn is_limited_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// 224.0.0.0/4
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xF0 == 0xE0
    }

    /// Parse `a.b.c.d/prefix` into an address and its netmask.
    pub fn parse_cidr(s: &str) -> Result<(Ipv4Address, Ipv4Address)> {
        let invalid = || Error::InvalidAddress(s.to_string());
        let (addr, prefix) = s.split_once('/').ok_or_else(invalid)?;
        let addr: Ipv4Address = addr.parse()?;
        let prefix: u32 = prefix.parse().map_err(|_| invalid())?;
        if prefix > 32 {
            return Err(invalid());
        }
        let mask = match prefix {
            0 => 0,
            n => u32::MAX << (32 - n),
        };
        Ok((addr, Ipv4Address(mask.to_be_bytes())))
    }
}

impl From<Ipv4Address> for u32 {
    fn from(addr: Ipv4Address) -> u32 {
        u32::from_be_bytes(addr.0)
    }
}

impl From<[u8; 4]> for Ipv4Address {
    fn from(octets: [u8; 4]) -> Self {
        Ipv4Address(octets)
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr.octets())
    }
}

impl From<Ipv4Address> for Ipv4Addr {
    fn from(addr: Ipv4Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl FromStr for Ipv4Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address::from)
            .map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.0[0], self.0[1], self.0[2], self.0[3])
    }
}

/// The fixed part of an IPv4 header, field for field as on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawIpv4Header {
    pub version_ihl: u8,
    pub tos: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags_fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub source: Ipv4Address,
    pub destination: Ipv4Address,
}

impl RawIpv4Header {
    /// Parse the first 20 bytes of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, IPV4_HEADER_LEN)?;

        let mut source = [0u8; 4];
        let mut destination = [0u8; 4];
        source.copy_from_slice(&data[12..16]);
        destination.copy_from_slice(&data[16..20]);

        Ok(RawIpv4Header {
            version_ihl: data[0],
            tos: data[1],
            total_length: BigEndian::read_u16(&data[2..4]),
            identification: BigEndian::read_u16(&data[4..6]),
            flags_fragment_offset: BigEndian::read_u16(&data[6..8]),
            ttl: data[8],
            protocol: data[9],
            checksum: BigEndian::read_u16(&data[10..12]),
            source: Ipv4Address(source),
            destination: Ipv4Address(destination),
        })
    }

    pub fn to_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut bytes = [0u8; IPV4_HEADER_LEN];
        bytes[0] = self.version_ihl;
        bytes[1] = self.tos;
        BigEndian::write_u16(&mut bytes[2..4], self.total_length);
        BigEndian::write_u16(&mut bytes[4..6], self.identification);
        BigEndian::write_u16(&mut bytes[6..8], self.flags_fragment_offset);
        bytes[8] = self.ttl;
        bytes[9] = self.protocol;
        BigEndian::write_u16(&mut bytes[10..12], self.checksum);
        bytes[12..16].copy_from_slice(&self.source.0);
        bytes[16..20].copy_from_slice(&self.destination.0);
        bytes
    }

    /// Split the packed fields into a logical header without options.
    pub fn header(&self) -> Ipv4Header {
        Ipv4Header {
            version: self.version_ihl >> 4,
            ihl: self.version_ihl & 0x0F,
            tos: self.tos,
            total_length: self.total_length,
            identification: self.identification,
            flags: ((self.flags_fragment_offset >> 13) & 0x7) as u8,
            fragment_offset: self.flags_fragment_offset & flags::FRAGMENT_OFFSET_MASK,
            ttl: self.ttl,
            protocol: self.protocol,
            checksum: self.checksum,
            source: self.source,
            destination: self.destination,
            options: Vec::new(),
        }
    }
}

/// IPv4 packet header structure
///
/// Represents the logical IPv4 header as defined in RFC 791, options included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8, // Internet Header Length, in 32-bit words
    pub tos: u8, // Type of Service
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,            // 3 bits
    pub fragment_offset: u16, // 13 bits
    pub ttl: u8,              // Time to Live
    pub protocol: u8,         // Next Protocol
    pub checksum: u16,
    pub source: Ipv4Address,
    pub destination: Ipv4Address,
    pub options: Vec<u8>,
}

impl Ipv4Header {
    /// Create a new IPv4 header with default values
    ///
    /// Only requires the essential parameters. The checksum is left at zero;
    /// the IPv4 layer fills it in when sending.
    pub fn new(
        protocol: u8,
        source: Ipv4Address,
        destination: Ipv4Address,
        payload_len: u16,
    ) -> Self {
        Ipv4Header {
            version: IPV4_VERSION,
            ihl: DEFAULT_IHL,
            tos: 0,
            total_length: (IPV4_HEADER_LEN as u16).saturating_add(payload_len),
            identification: 0,
            flags: 0,
            fragment_offset: 0,
            ttl: DEFAULT_TTL,
            protocol,
            checksum: 0,
            source,
            destination,
            options: Vec::new(),
        }
    }

    /// Parse a header, options included, from the start of `data`.
    ///
    /// Only the IHL is looked at here; see [`Ipv4Header::check`] for the rest.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut header = RawIpv4Header::from_bytes(data)?.header();
        if header.ihl < DEFAULT_IHL {
            return Err(Error::InvalidIhl);
        }

        let header_len = header.header_len();
        ensure_len(data, header_len)?;
        header.options = data[IPV4_HEADER_LEN..header_len].to_vec();

        Ok(header)
    }

    /// Pack the logical fields back into their wire form.
    pub fn raw(&self) -> RawIpv4Header {
        RawIpv4Header {
            version_ihl: (self.version << 4) | (self.ihl & 0x0F),
            tos: self.tos,
            total_length: self.total_length,
            identification: self.identification,
            flags_fragment_offset: ((self.flags as u16 & 0x7) << 13)
                | (self.fragment_offset & flags::FRAGMENT_OFFSET_MASK),
            ttl: self.ttl,
            protocol: self.protocol,
            checksum: self.checksum,
            source: self.source,
            destination: self.destination,
        }
    }

    /// Convert IPv4 header to bytes, options included
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(IPV4_HEADER_LEN + self.options.len());
        bytes.extend_from_slice(&self.raw().to_bytes());
        bytes.extend_from_slice(&self.options);
        bytes
    }

    /// Get the header length in bytes
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }

    /// Get payload length
    ///
    /// Returns the length of the payload (total length - header length)
    pub fn payload_len(&self) -> usize {
        (self.total_length as usize).saturating_sub(self.header_len())
    }

    /// Checksum of the header with its checksum field treated as zero.
    pub fn calculate_checksum(&self) -> u16 {
        let mut bytes = self.to_bytes();
        bytes[10] = 0;
        bytes[11] = 0;
        checksum(&bytes)
    }

    /// Update checksum after modifying header fields
    pub fn update_checksum(&mut self) {
        self.checksum = self.calculate_checksum();
    }

    /// Validate the header.
    ///
    /// Fails with [`Error::InvalidIhl`] when the IHL does not match the
    /// options, [`Error::InvalidTotalLength`] when the total length cannot
    /// hold the header, [`Error::InvalidChecksum`] on a bad checksum and
    /// [`Error::InvalidVersion`] for anything but version 4.
    pub fn check(&self) -> Result<()> {
        if self.options.len() % 4 != 0 || self.ihl as usize != 5 + self.options.len() / 4 {
            return Err(Error::InvalidIhl);
        }
        if self.header_len() > self.total_length as usize {
            return Err(Error::InvalidTotalLength);
        }
        if self.calculate_checksum() != self.checksum {
            return Err(Error::InvalidChecksum);
        }
        if self.version != IPV4_VERSION {
            return Err(Error::InvalidVersion(self.version));
        }
        Ok(())
    }
}

/// An IPv4 header and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Packet {
    /// A default packet to `destination`. Source, identification and checksum
    /// are assigned by the IPv4 layer on send.
    ///
    /// TotalLength saturates for oversized payloads; see
    /// [`Ipv4Packet::update_total_length`].
    pub fn new_to(destination: Ipv4Address, protocol: u8, payload: Vec<u8>) -> Self {
        let payload_len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
        let header = Ipv4Header::new(protocol, Ipv4Address::UNSPECIFIED, destination, payload_len);
        Ipv4Packet { header, payload }
    }

    /// Parse and validate a packet.
    ///
    /// Exactly `TotalLength - IHL*4` payload bytes are taken; anything after
    /// them (link layer padding) is ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let header = Ipv4Header::from_bytes(data)?;
        header.check()?;

        let start = header.header_len();
        let end = header.total_length as usize;
        ensure_len(data, end)?;

        Ok(Ipv4Packet {
            payload: data[start..end].to_vec(),
            header,
        })
    }

    /// Recompute TotalLength from the options and payload.
    ///
    /// Fails with [`Error::PayloadTooLarge`] when the packet does not fit the
    /// 16-bit field.
    pub fn update_total_length(&mut self) -> Result<()> {
        let size = self.header.header_len() + self.payload.len();
        self.header.total_length = u16::try_from(size).map_err(|_| Error::PayloadTooLarge {
            size,
            limit: u16::MAX as usize,
        })?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.header.to_bytes();
        bytes.extend_from_slice(&self.payload);
        bytes
    }
}

/// IPv4 protocol constants
pub mod protocol {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

/// IPv4 flags constants (the 3-bit field of the logical header)
pub mod flags {
    pub const DONT_FRAGMENT: u8 = 0b010;
    pub const MORE_FRAGMENTS: u8 = 0b001;
    pub const FRAGMENT_OFFSET_MASK: u16 = 0x1FFF;
}

#[cfg(test)]
mod tests {
    use super::*;

    // 450000349c8340003e0656dbc0a86401c0a86413
    const HEADER_BYTES: [u8; 20] = [
        0x45, 0x00, 0x00, 0x34, 0x9c, 0x83, 0x40, 0x00, 0x3e, 0x06, 0x56, 0xdb, 0xc0, 0xa8, 0x64,
        0x01, 0xc0, 0xa8, 0x64, 0x13,
    ];

    fn expected_header() -> Ipv4Header {
        Ipv4Header {
            version: 4,
            ihl: 5,
            tos: 0,
            total_length: 52,
            identification: 40067,
            flags: flags::DONT_FRAGMENT,
            fragment_offset: 0,
            ttl: 62,
            protocol: protocol::TCP,
            checksum: 0x56DB,
            source: Ipv4Address::new(192, 168, 100, 1),
            destination: Ipv4Address::new(192, 168, 100, 19),
            options: Vec::new(),
        }
    }

    #[test]
    fn test_raw_header_roundtrip() {
        let raw = RawIpv4Header::from_bytes(&HEADER_BYTES).unwrap();
        assert_eq!(raw.version_ihl, 0x45);
        assert_eq!(raw.flags_fragment_offset, 0x4000);
        assert_eq!(raw.to_bytes(), HEADER_BYTES);
    }

    #[test]
    fn test_header_decode() {
        let header = Ipv4Header::from_bytes(&HEADER_BYTES).unwrap();
        assert_eq!(header, expected_header());
        assert_eq!(header.to_bytes(), HEADER_BYTES.to_vec());
        assert!(header.check().is_ok());
    }

    #[test]
    fn test_header_conversion() {
        let raw = RawIpv4Header::from_bytes(&HEADER_BYTES).unwrap();
        assert_eq!(raw.header(), expected_header());
        assert_eq!(expected_header().raw(), raw);
    }

    #[test]
    fn test_header_with_options() {
        let mut bytes = HEADER_BYTES.to_vec();
        bytes[0] = 0x46;
        bytes.extend_from_slice(&[0, 1, 2, 3]);

        let header = Ipv4Header::from_bytes(&bytes).unwrap();
        assert_eq!(header.ihl, 6);
        assert_eq!(header.options, vec![0, 1, 2, 3]);
        assert_eq!(header.to_bytes(), bytes);
    }

    #[test]
    fn test_options_truncated() {
        let mut bytes = HEADER_BYTES.to_vec();
        bytes[0] = 0x47;
        bytes.extend_from_slice(&[0, 1, 2, 3]);
        assert!(matches!(
            Ipv4Header::from_bytes(&bytes),
            Err(Error::PacketTooShort { needed: 28, got: 24 })
        ));
    }

    #[test]
    fn test_invalid_ihl_decode() {
        let mut bytes = HEADER_BYTES;
        bytes[0] = 0x44;
        assert!(matches!(Ipv4Header::from_bytes(&bytes), Err(Error::InvalidIhl)));
        assert!(matches!(Ipv4Packet::from_bytes(&bytes), Err(Error::InvalidIhl)));
    }

    #[test]
    fn test_check_valid_options() {
        let mut header = expected_header();
        header.ihl = 6;
        header.options = vec![1, 2, 3, 4];
        header.update_checksum();
        assert!(header.check().is_ok());
    }

    #[test]
    fn test_check_invalid_ihl() {
        let cases: [(u8, Vec<u8>); 3] = [(6, vec![]), (7, vec![1, 2, 3, 4]), (6, vec![1])];
        for (ihl, options) in cases {
            let mut header = expected_header();
            header.ihl = ihl;
            header.options = options;
            header.update_checksum();
            assert!(matches!(header.check(), Err(Error::InvalidIhl)));
        }
    }

    #[test]
    fn test_check_invalid_checksum() {
        let mut header = expected_header();
        header.checksum = !header.checksum;
        assert!(matches!(header.check(), Err(Error::InvalidChecksum)));
    }

    #[test]
    fn test_check_invalid_total_length() {
        let mut header = expected_header();
        header.total_length = 19;
        header.update_checksum();
        assert!(matches!(header.check(), Err(Error::InvalidTotalLength)));
    }

    #[test]
    fn test_check_invalid_version() {
        let mut header = expected_header();
        header.version = 6;
        header.update_checksum();
        assert!(matches!(header.check(), Err(Error::InvalidVersion(6))));
    }

    #[test]
    fn test_packet_ignores_padding() {
        let destination = Ipv4Address::new(10, 0, 0, 2);
        let mut packet = Ipv4Packet::new_to(destination, protocol::UDP, vec![7; 6]);
        packet.header.source = Ipv4Address::new(10, 0, 0, 1);
        packet.header.update_checksum();

        let mut bytes = packet.to_bytes();
        assert_eq!(bytes.len(), 26);
        bytes.extend_from_slice(&[0; 20]);

        assert_eq!(Ipv4Packet::from_bytes(&bytes).unwrap(), packet);
    }

    #[test]
    fn test_packet_truncated_payload() {
        let destination = Ipv4Address::new(10, 0, 0, 2);
        let mut packet = Ipv4Packet::new_to(destination, protocol::UDP, vec![7; 6]);
        packet.header.update_checksum();
        let bytes = packet.to_bytes();
        assert!(matches!(
            Ipv4Packet::from_bytes(&bytes[..24]),
            Err(Error::PacketTooShort { .. })
        ));
    }

    #[test]
    fn test_total_length_overflow() {
        let destination = Ipv4Address::new(10, 0, 0, 2);
        let mut packet = Ipv4Packet::new_to(destination, protocol::UDP, vec![0; 70000]);
        assert_eq!(packet.header.total_length, u16::MAX);
        assert!(matches!(
            packet.update_total_length(),
            Err(Error::PayloadTooLarge { size: 70020, limit: 65535 })
        ));

        packet.payload.truncate(100);
        packet.update_total_length().unwrap();
        assert_eq!(packet.header.total_length, 120);
    }

    #[test]
    fn test_address_parse() {
        let addr: Ipv4Address = "192.168.100.1".parse().unwrap();
        assert_eq!(addr, Ipv4Address::new(192, 168, 100, 1));
        assert_eq!(addr.to_string(), "192.168.100.1");
        assert!("not an address".parse::<Ipv4Address>().is_err());
        assert!("::1".parse::<Ipv4Address>().is_err());
    }

    #[test]
    fn test_parse_cidr() {
        let (addr, netmask) = Ipv4Address::parse_cidr("10.0.0.1/24").unwrap();
        assert_eq!(addr, Ipv4Address::new(10, 0, 0, 1));
        assert_eq!(netmask, Ipv4Address::new(255, 255, 255, 0));

        let (_, netmask) = Ipv4Address::parse_cidr("172.16.0.1/12").unwrap();
        assert_eq!(netmask, Ipv4Address::new(255, 240, 0, 0));

        let (_, netmask) = Ipv4Address::parse_cidr("0.0.0.0/0").unwrap();
        assert_eq!(netmask, Ipv4Address::UNSPECIFIED);

        assert!(Ipv4Address::parse_cidr("10.0.0.1").is_err());
        assert!(Ipv4Address::parse_cidr("10.0.0.1/33").is_err());
    }

    #[test]
    fn test_broadcast_detection() {
        let local = Ipv4Address::new(192, 168, 1, 1);
        let netmask = Ipv4Address::new(255, 255, 255, 0);
        assert_eq!(local.directed_broadcast(netmask), Ipv4Address::new(192, 168, 1, 255));
        assert_eq!(local.mask(netmask), Ipv4Address::new(192, 168, 1, 0));
        assert!(Ipv4Address::BROADCAST.is_limited_broadcast());
        assert!(Ipv4Address::new(224, 0, 0, 251).is_multicast());
        assert!(!local.is_multicast());
    }
}
