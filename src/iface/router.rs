//! Next-hop selection for outbound IPv4 packets.

use crate::error::{Error, Result};
use crate::iface::arp::AddressResolver;
use crate::network::ethernet::MacAddress;
use crate::network::ipv4::Ipv4Address;
use log::debug;
use std::sync::Arc;

pub struct Router {
    resolver: Arc<dyn AddressResolver>,
    address: Ipv4Address,
    netmask: Ipv4Address,
    gateway: Option<Ipv4Address>,
}

impl Router {
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        address: Ipv4Address,
        netmask: Ipv4Address,
        gateway: Option<Ipv4Address>,
    ) -> Self {
        Router {
            resolver,
            address,
            netmask,
            gateway,
        }
    }

    /// Check if address is a broadcast address
    pub fn is_broadcast(&self, addr: Ipv4Address) -> bool {
        addr.is_limited_broadcast() || addr == self.address.directed_broadcast(self.netmask)
    }

    pub fn is_same_network(&self, addr: Ipv4Address) -> bool {
        addr.mask(self.netmask) == self.address.mask(self.netmask)
    }

    /// MAC address of the next hop towards `destination`.
    ///
    /// Broadcast and multicast destinations are mapped to a multicast MAC
    /// without asking anyone. Hosts on the local subnet are resolved
    /// directly, everything else through the gateway. Fails with
    /// [`Error::NoRoute`] when there is no gateway or the next hop does not
    /// answer.
    pub fn resolve(&self, destination: Ipv4Address) -> Result<MacAddress> {
        if self.is_broadcast(destination) || destination.is_multicast() {
            return Ok(MacAddress::ipv4_multicast(destination.octets()));
        }

        let next_hop = if self.is_same_network(destination) {
            destination
        } else {
            match self.gateway {
                Some(gateway) => gateway,
                None => return Err(Error::NoRoute(destination)),
            }
        };

        match self.resolver.resolve(next_hop) {
            Ok(mac) => Ok(mac),
            Err(Error::ArpTimeout(_)) => {
                debug!("No answer from next hop {} for {}", next_hop, destination);
                Err(Error::NoRoute(destination))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const GATEWAY_MAC: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0xFE]);
    const HOST_MAC: MacAddress = MacAddress([0x02, 0, 0, 0, 0, 0x02]);

    struct StaticResolver(HashMap<Ipv4Address, MacAddress>);

    impl AddressResolver for StaticResolver {
        fn resolve(&self, address: Ipv4Address) -> Result<MacAddress> {
            self.0
                .get(&address)
                .copied()
                .ok_or(Error::ArpTimeout(address))
        }
    }

    fn router(gateway: Option<Ipv4Address>) -> Router {
        let mut table = HashMap::new();
        table.insert(Ipv4Address::new(10, 0, 0, 1), GATEWAY_MAC);
        table.insert(Ipv4Address::new(10, 0, 0, 2), HOST_MAC);
        Router::new(
            Arc::new(StaticResolver(table)),
            Ipv4Address::new(10, 0, 0, 1),
            Ipv4Address::new(255, 255, 255, 0),
            gateway,
        )
    }

    #[test]
    fn test_directed_broadcast() {
        let mac = router(None).resolve(Ipv4Address::new(10, 0, 0, 255)).unwrap();
        assert_eq!(mac, MacAddress([0x01, 0x00, 0x5E, 0x00, 0x00, 0xFF]));
    }

    #[test]
    fn test_limited_broadcast() {
        let mac = router(None).resolve(Ipv4Address::BROADCAST).unwrap();
        assert_eq!(mac, MacAddress([0x01, 0x00, 0x5E, 0x7F, 0xFF, 0xFF]));
    }

    #[test]
    fn test_multicast() {
        let mac = router(None).resolve(Ipv4Address::new(224, 0, 0, 251)).unwrap();
        assert_eq!(mac, MacAddress([0x01, 0x00, 0x5E, 0x00, 0x00, 0xFB]));
    }

    #[test]
    fn test_local_subnet() {
        let mac = router(None).resolve(Ipv4Address::new(10, 0, 0, 2)).unwrap();
        assert_eq!(mac, HOST_MAC);
    }

    #[test]
    fn test_no_route_without_gateway() {
        let dst = Ipv4Address::new(8, 8, 8, 8);
        assert!(matches!(router(None).resolve(dst), Err(Error::NoRoute(addr)) if addr == dst));
    }

    #[test]
    fn test_via_gateway() {
        let router = router(Some(Ipv4Address::new(10, 0, 0, 1)));
        assert_eq!(router.resolve(Ipv4Address::new(8, 8, 8, 8)).unwrap(), GATEWAY_MAC);
    }

    #[test]
    fn test_unanswered_neighbour_is_no_route() {
        let dst = Ipv4Address::new(10, 0, 0, 77);
        assert!(matches!(router(None).resolve(dst), Err(Error::NoRoute(addr)) if addr == dst));
    }

    #[test]
    fn test_same_network() {
        let router = router(None);
        assert!(router.is_same_network(Ipv4Address::new(10, 0, 0, 100)));
        assert!(!router.is_same_network(Ipv4Address::new(10, 0, 1, 1)));
        assert!(router.is_broadcast(Ipv4Address::new(10, 0, 0, 255)));
        assert!(!router.is_broadcast(Ipv4Address::new(10, 0, 0, 2)));
    }
}
