//! Construction-time configuration of the stack.

use crate::error::Result;
use crate::network::ipv4::Ipv4Address;
use std::time::Duration;

/// Default expiration of ARP cache entries.
pub const DEFAULT_ARP_EXPIRATION: Duration = Duration::from_secs(4 * 60 * 60);
/// Expired ARP entries are swept at this cadence.
pub const DEFAULT_ARP_CLEANUP_INTERVAL: Duration = DEFAULT_ARP_EXPIRATION;
/// Delay between two ARP requests for the same address.
pub const DEFAULT_ARP_QUERY_INTERVAL: Duration = Duration::from_secs(1);
/// Number of ARP requests sent before giving up.
pub const DEFAULT_ARP_RETRIES: u32 = 3;
/// Bound of every inter-layer queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// What the Ethernet layer does with frames nobody subscribed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownFrames {
    Discard,
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArpConfig {
    pub cache_ttl: Duration,
    pub cleanup_interval: Duration,
    pub query_interval: Duration,
    pub retries: u32,
}

impl Default for ArpConfig {
    fn default() -> Self {
        ArpConfig {
            cache_ttl: DEFAULT_ARP_EXPIRATION,
            cleanup_interval: DEFAULT_ARP_CLEANUP_INTERVAL,
            query_interval: DEFAULT_ARP_QUERY_INTERVAL,
            retries: DEFAULT_ARP_RETRIES,
        }
    }
}

impl ArpConfig {
    /// Upper bound on how long a single resolution can wait.
    pub fn resolve_timeout(&self) -> Duration {
        self.query_interval * self.retries
    }
}

/// Host identity and tuning knobs. The MAC address comes from the NIC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub address: Ipv4Address,
    pub netmask: Ipv4Address,
    pub gateway: Option<Ipv4Address>,
    pub arp: ArpConfig,
    pub queue_capacity: usize,
    pub unknown_frames: UnknownFrames,
    /// Compute checksums on outbound UDP datagrams; when false they carry 0.
    pub udp_checksum: bool,
}

impl StackConfig {
    pub fn new(address: Ipv4Address, netmask: Ipv4Address) -> Self {
        StackConfig {
            address,
            netmask,
            gateway: None,
            arp: ArpConfig::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            unknown_frames: UnknownFrames::Discard,
            udp_checksum: true,
        }
    }

    /// Build a configuration from `a.b.c.d/prefix`.
    pub fn from_cidr(cidr: &str) -> Result<Self> {
        let (address, netmask) = Ipv4Address::parse_cidr(cidr)?;
        Ok(Self::new(address, netmask))
    }

    pub fn with_gateway(mut self, gateway: Ipv4Address) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_arp(mut self, arp: ArpConfig) -> Self {
        self.arp = arp;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_unknown_frames(mut self, unknown_frames: UnknownFrames) -> Self {
        self.unknown_frames = unknown_frames;
        self
    }

    pub fn with_udp_checksum(mut self, enabled: bool) -> Self {
        self.udp_checksum = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StackConfig::from_cidr("10.0.0.1/24").unwrap();
        assert_eq!(config.address, Ipv4Address::new(10, 0, 0, 1));
        assert_eq!(config.netmask, Ipv4Address::new(255, 255, 255, 0));
        assert_eq!(config.gateway, None);
        assert_eq!(config.arp.cache_ttl, Duration::from_secs(14400));
        assert_eq!(config.arp.query_interval, Duration::from_secs(1));
        assert_eq!(config.arp.retries, 3);
        assert_eq!(config.arp.resolve_timeout(), Duration::from_secs(3));
        assert!(config.udp_checksum);
    }

    #[test]
    fn test_builder() {
        let config = StackConfig::from_cidr("10.0.0.1/24")
            .unwrap()
            .with_gateway(Ipv4Address::new(10, 0, 0, 254))
            .with_unknown_frames(UnknownFrames::Log)
            .with_udp_checksum(false);
        assert_eq!(config.gateway, Some(Ipv4Address::new(10, 0, 0, 254)));
        assert_eq!(config.unknown_frames, UnknownFrames::Log);
        assert!(!config.udp_checksum);
    }

    #[test]
    fn test_invalid_cidr() {
        assert!(StackConfig::from_cidr("10.0.0.1").is_err());
    }
}
