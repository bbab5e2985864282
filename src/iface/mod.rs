//! Network interface and the protocol layers stacked on top of it
//!
//! Every layer owns one receive thread that reads the stream of the layer
//! below and fans packets out to per-discriminant subscriber streams:
//! - Ethernet by EtherType
//! - IPv4 by protocol number
//! - ICMP by message type
//! - UDP by destination port

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod nic;
pub mod router;
pub mod tap;
pub mod udp;

// Re-export commonly used items
pub use arp::{AddressResolver, ArpCache, ArpResolver};
pub use ethernet::EthernetLayer;
pub use icmp::{IcmpDatagram, IcmpLayer};
pub use ipv4::Ipv4Layer;
pub use nic::{MemoryNic, Nic, Wire};
pub use router::Router;
pub use tap::TapNic;
pub use udp::UdpLayer;
