//! A small user-space TCP/IP stack in Rust
//!
//! This library runs a single host above a raw Ethernet interface:
//! - Ethernet II framing and EtherType demultiplexing
//! - ARP resolution with a TTL cache and request coalescing
//! - IPv4 packet processing and next-hop routing
//! - ICMP echo request/reply handling
//! - UDP datagrams with per-port subscriptions
//!
//! Frames come from a [`Nic`]: a Linux TAP device ([`TapNic`]) or an
//! in-memory cable ([`MemoryNic`]).

pub mod config;
pub mod demux;
pub mod error;
pub mod iface;
pub mod network;
pub mod stack;
pub mod transport;

// Re-export commonly used types
pub use config::{ArpConfig, StackConfig, UnknownFrames};
pub use error::{Error, Result};
pub use iface::{MemoryNic, Nic, TapNic, Wire};
pub use network::ethernet::MacAddress;
pub use network::icmp::{IcmpPacket, ICMP_TYPE_ECHO_REPLY, ICMP_TYPE_ECHO_REQUEST};
pub use network::ipv4::{Ipv4Address, Ipv4Header, Ipv4Packet};
pub use stack::Stack;
pub use transport::udp::UdpPacket;
