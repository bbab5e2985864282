//! Ethernet II frame format
//!
//! 6 bytes destination, 6 bytes source, 2 bytes EtherType, payload. The NIC
//! strips and appends the frame check sequence, so it never shows up here.

use crate::error::{ensure_len, Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::str::FromStr;

/// Ethernet header length in bytes
pub const ETHERNET_HEADER_LEN: usize = 14;

/// Largest payload carried by a single frame
pub const ETHERNET_MTU: usize = 1500;

/// A 48-bit MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const BROADCAST: MacAddress = MacAddress([0xFF; 6]);
    pub const ZERO: MacAddress = MacAddress([0; 6]);

    /// Prefix used to map IPv4 multicast groups onto Ethernet addresses.
    pub const IPV4_MULTICAST: MacAddress = MacAddress([0x01, 0x00, 0x5E, 0x00, 0x00, 0x00]);

    /// Derive the multicast MAC for an IPv4 address by OR-ing its low 23 bits
    /// onto `01:00:5E:00:00:00`.
    pub fn ipv4_multicast(addr: [u8; 4]) -> Self {
        let mut mac = Self::IPV4_MULTICAST.0;
        mac[3] |= addr[1] & 0x7F;
        mac[4] |= addr[2];
        mac[5] |= addr[3];
        MacAddress(mac)
    }

    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidAddress(s.to_string());
        let mut mac = [0u8; 6];
        let mut parts = s.split(|c| c == ':' || c == '-');
        for byte in mac.iter_mut() {
            let part = parts.next().ok_or_else(invalid)?;
            if part.len() != 2 {
                return Err(invalid());
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(MacAddress(mac))
    }
}

/// Either the protocol carried by a frame or, for values up to 1500, an
/// IEEE 802.3 payload length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EtherType(pub u16);

impl EtherType {
    pub const IPV4: EtherType = EtherType(0x0800);
    pub const ARP: EtherType = EtherType(0x0806);

    /// Whether the field holds a payload length rather than an EtherType.
    pub fn is_length(&self) -> bool {
        self.0 as usize <= ETHERNET_MTU
    }
}

impl fmt::Display for EtherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

/// An Ethernet II frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ether_type: EtherType,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame for `destination`; the source is filled in when sending.
    pub fn new(destination: MacAddress, ether_type: EtherType, payload: Vec<u8>) -> Self {
        Frame {
            destination,
            source: MacAddress::ZERO,
            ether_type,
            payload,
        }
    }

    /// Parse a frame from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, ETHERNET_HEADER_LEN)?;

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);

        Ok(Frame {
            destination: MacAddress(destination),
            source: MacAddress(source),
            ether_type: EtherType(BigEndian::read_u16(&data[12..14])),
            payload: data[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }

    /// Serialize the frame for the NIC.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; ETHERNET_HEADER_LEN + self.payload.len()];
        bytes[0..6].copy_from_slice(&self.destination.0);
        bytes[6..12].copy_from_slice(&self.source.0);
        BigEndian::write_u16(&mut bytes[12..14], self.ether_type.0);
        bytes[ETHERNET_HEADER_LEN..].copy_from_slice(&self.payload);
        bytes
    }
}
