//! A complete host: every layer wired on top of one NIC.

use crate::config::StackConfig;
use crate::error::Result;
use crate::iface::arp::ArpResolver;
use crate::iface::ethernet::EthernetLayer;
use crate::iface::icmp::IcmpLayer;
use crate::iface::ipv4::Ipv4Layer;
use crate::iface::nic::Nic;
use crate::iface::router::Router;
use crate::iface::udp::UdpLayer;
use crate::network::ethernet::MacAddress;
use crate::network::ipv4::Ipv4Address;
use log::info;
use std::sync::Arc;

pub struct Stack {
    config: StackConfig,
    ethernet: Arc<EthernetLayer>,
    arp: Arc<ArpResolver>,
    ipv4: Arc<Ipv4Layer>,
    icmp: Arc<IcmpLayer>,
    udp: Arc<UdpLayer>,
}

impl Stack {
    /// Start every layer on top of `nic`. The stack answers ARP requests and
    /// pings as soon as this returns.
    pub fn new(nic: Arc<dyn Nic>, config: StackConfig) -> Result<Self> {
        let capacity = config.queue_capacity;

        let ethernet = EthernetLayer::new(nic, capacity, config.unknown_frames)?;
        let arp = Arc::new(ArpResolver::new(ethernet.clone(), config.address, &config.arp)?);
        let router = Router::new(arp.clone(), config.address, config.netmask, config.gateway);
        let ipv4 = Ipv4Layer::new(ethernet.clone(), router, config.address, capacity)?;
        let icmp = IcmpLayer::new(ipv4.clone(), capacity)?;
        let udp = UdpLayer::new(ipv4.clone(), capacity, config.udp_checksum)?;

        info!(
            "Stack up: {} ({}) netmask {} gateway {}",
            config.address,
            ethernet.mac(),
            config.netmask,
            config
                .gateway
                .map_or_else(|| "none".to_string(), |gateway| gateway.to_string())
        );

        Ok(Stack {
            config,
            ethernet,
            arp,
            ipv4,
            icmp,
            udp,
        })
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    pub fn mac(&self) -> MacAddress {
        self.ethernet.mac()
    }

    pub fn address(&self) -> Ipv4Address {
        self.config.address
    }

    pub fn ethernet(&self) -> &Arc<EthernetLayer> {
        &self.ethernet
    }

    pub fn arp(&self) -> &Arc<ArpResolver> {
        &self.arp
    }

    pub fn ipv4(&self) -> &Arc<Ipv4Layer> {
        &self.ipv4
    }

    pub fn icmp(&self) -> &Arc<IcmpLayer> {
        &self.icmp
    }

    pub fn udp(&self) -> &Arc<UdpLayer> {
        &self.udp
    }

    /// Close the NIC and wait for every receive thread, bottom-up. Streams
    /// handed out by the layers end once drained.
    pub fn shutdown(&self) {
        self.ethernet.close();
        self.ethernet.join();
        self.arp.join();
        self.ipv4.join();
        self.icmp.join();
        self.udp.join();
        info!("Stack down");
    }
}
