//! ARP packet format (RFC 826), restricted to Ethernet/IPv4.

use crate::error::{ensure_len, Error, Result};
use crate::network::ethernet::{EtherType, MacAddress};
use crate::network::ipv4::Ipv4Address;
use byteorder::{BigEndian, ByteOrder};

/// Length of an Ethernet/IPv4 ARP packet
pub const ARP_PACKET_LEN: usize = 28;

pub const ARP_HARDWARE_ETHERNET: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOperation {
    Request,
    Reply,
    Unknown(u16),
}

impl From<u16> for ArpOperation {
    fn from(value: u16) -> Self {
        match value {
            1 => ArpOperation::Request,
            2 => ArpOperation::Reply,
            other => ArpOperation::Unknown(other),
        }
    }
}

impl From<ArpOperation> for u16 {
    fn from(op: ArpOperation) -> u16 {
        match op {
            ArpOperation::Request => 1,
            ArpOperation::Reply => 2,
            ArpOperation::Unknown(other) => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpPacket {
    pub hardware_type: u16,
    pub protocol_type: u16,
    pub hardware_len: u8,
    pub protocol_len: u8,
    pub operation: ArpOperation,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Address,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Address,
}

impl ArpPacket {
    fn new(
        operation: ArpOperation,
        sender_mac: MacAddress,
        sender_ip: Ipv4Address,
        target_mac: MacAddress,
        target_ip: Ipv4Address,
    ) -> Self {
        ArpPacket {
            hardware_type: ARP_HARDWARE_ETHERNET,
            protocol_type: EtherType::IPV4.0,
            hardware_len: 6,
            protocol_len: 4,
            operation,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Who has `target_ip`? Tell `sender_ip`.
    pub fn request(sender_mac: MacAddress, sender_ip: Ipv4Address, target_ip: Ipv4Address) -> Self {
        Self::new(
            ArpOperation::Request,
            sender_mac,
            sender_ip,
            MacAddress::ZERO,
            target_ip,
        )
    }

    pub fn reply(
        sender_mac: MacAddress,
        sender_ip: Ipv4Address,
        target_mac: MacAddress,
        target_ip: Ipv4Address,
    ) -> Self {
        Self::new(ArpOperation::Reply, sender_mac, sender_ip, target_mac, target_ip)
    }

    /// Parse an ARP packet.
    ///
    /// Anything other than Ethernet hardware addresses resolving IPv4
    /// addresses is rejected with [`Error::UnsupportedArpPacket`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        ensure_len(data, ARP_PACKET_LEN)?;

        let hardware_type = BigEndian::read_u16(&data[0..2]);
        let protocol_type = BigEndian::read_u16(&data[2..4]);
        let hardware_len = data[4];
        let protocol_len = data[5];
        if hardware_type != ARP_HARDWARE_ETHERNET
            || protocol_type != EtherType::IPV4.0
            || hardware_len != 6
            || protocol_len != 4
        {
            return Err(Error::UnsupportedArpPacket);
        }

        let mut sender_mac = [0u8; 6];
        let mut sender_ip = [0u8; 4];
        let mut target_mac = [0u8; 6];
        let mut target_ip = [0u8; 4];
        sender_mac.copy_from_slice(&data[8..14]);
        sender_ip.copy_from_slice(&data[14..18]);
        target_mac.copy_from_slice(&data[18..24]);
        target_ip.copy_from_slice(&data[24..28]);

        Ok(ArpPacket {
            hardware_type,
            protocol_type,
            hardware_len,
            protocol_len,
            operation: BigEndian::read_u16(&data[6..8]).into(),
            sender_mac: MacAddress(sender_mac),
            sender_ip: Ipv4Address(sender_ip),
            target_mac: MacAddress(target_mac),
            target_ip: Ipv4Address(target_ip),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; ARP_PACKET_LEN];
        BigEndian::write_u16(&mut bytes[0..2], self.hardware_type);
        BigEndian::write_u16(&mut bytes[2..4], self.protocol_type);
        bytes[4] = self.hardware_len;
        bytes[5] = self.protocol_len;
        BigEndian::write_u16(&mut bytes[6..8], self.operation.into());
        bytes[8..14].copy_from_slice(&self.sender_mac.0);
        bytes[14..18].copy_from_slice(&self.sender_ip.0);
        bytes[18..24].copy_from_slice(&self.target_mac.0);
        bytes[24..28].copy_from_slice(&self.target_ip.0);
        bytes
    }
}
