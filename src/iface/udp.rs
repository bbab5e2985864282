//! UDP layer: datagrams in and out, demultiplexed by destination port.

use crate::demux::{Demux, Stream};
use crate::error::Result;
use crate::iface::ipv4::Ipv4Layer;
use crate::network::ipv4::{protocol, Ipv4Packet};
use crate::transport::udp::UdpPacket;
use log::{debug, info, trace};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct UdpLayer {
    ipv4: Arc<Ipv4Layer>,
    demux: Demux<u16, UdpPacket>,
    checksum: bool,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl UdpLayer {
    /// `checksum` controls whether outbound datagrams carry a checksum.
    pub fn new(ipv4: Arc<Ipv4Layer>, queue_capacity: usize, checksum: bool) -> Result<Arc<Self>> {
        let packets = ipv4.subscribe(protocol::UDP);
        let layer = Arc::new(UdpLayer {
            ipv4,
            demux: Demux::new(queue_capacity),
            checksum,
            receiver: Mutex::new(None),
        });

        let handle = {
            let layer = layer.clone();
            thread::Builder::new()
                .name("udp-rx".to_string())
                .spawn(move || layer.receive_all(packets))?
        };
        *layer.receiver.lock() = Some(handle);

        Ok(layer)
    }

    /// Datagrams sent to local `port`. Their `address` is the sender.
    pub fn subscribe(&self, port: u16) -> Stream<UdpPacket> {
        self.demux.subscribe(port)
    }

    /// Send `packet` to `packet.address`.
    pub fn send(&self, packet: UdpPacket) -> Result<()> {
        let destination = packet.address;
        let packet = if self.checksum {
            packet.with_checksum(self.ipv4.address(), destination)?
        } else {
            packet.without_checksum()?
        };
        trace!(
            "tx {} -> {}:{} ({} bytes)",
            packet.src_port(),
            destination,
            packet.dst_port(),
            packet.payload.len()
        );

        self.ipv4
            .send(Ipv4Packet::new_to(destination, protocol::UDP, packet.to_bytes()))
    }

    /// Wait for the receive thread to finish.
    pub fn join(&self) {
        if let Some(handle) = self.receiver.lock().take() {
            let _ = handle.join();
        }
    }

    fn receive_all(&self, packets: Stream<Ipv4Packet>) {
        for ip_packet in packets.iter() {
            let source = ip_packet.header.source;
            let destination = ip_packet.header.destination;
            let packet = match UdpPacket::from_bytes(&ip_packet.payload, source, destination) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("Invalid UDP packet from {}: {}", source, err);
                    continue;
                }
            };

            let port = packet.dst_port();
            if self.demux.dispatch(&port, packet).is_err() {
                debug!("No listener on UDP port {}", port);
            }
        }

        info!("UDP layer stopped");
        self.demux.close();
    }
}
