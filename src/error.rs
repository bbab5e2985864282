//! Errors shared by every layer of the stack.

use crate::network::ipv4::Ipv4Address;
use std::io;

/// Error that can happen while parsing, validating or sending a packet.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input ended before a fixed-size region was complete.
    #[error("packet too short: needed {needed} bytes, got {got}")]
    PacketTooShort { needed: usize, got: usize },

    #[error("unsupported IP version {0}")]
    InvalidVersion(u8),

    /// IHL is below 5 or does not match the length of the options.
    #[error("IHL field does not match the options length")]
    InvalidIhl,

    #[error("TotalLength field is smaller than the header")]
    InvalidTotalLength,

    #[error("checksum field is incorrect")]
    InvalidChecksum,

    /// UDP length field below the 8-byte header size.
    #[error("UDP length field is too small")]
    InvalidLength,

    /// A length field cannot hold the payload, or the packet does not fit
    /// in one Ethernet frame.
    #[error("payload of {size} bytes exceeds the limit of {limit}")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("unsupported ICMP packet (type {icmp_type}, code {code})")]
    UnsupportedIcmpPacket { icmp_type: u8, code: u8 },

    #[error("unsupported ARP packet")]
    UnsupportedArpPacket,

    #[error("ARP request for {0} timed out")]
    ArpTimeout(Ipv4Address),

    #[error("no route to {0}")]
    NoRoute(Ipv4Address),

    #[error("network interface is closed")]
    NicClosed,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("{0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Fails with [`Error::PacketTooShort`] unless `data` holds at least `needed` bytes.
pub(crate) fn ensure_len(data: &[u8], needed: usize) -> Result<()> {
    if data.len() < needed {
        return Err(Error::PacketTooShort {
            needed,
            got: data.len(),
        });
    }
    Ok(())
}
