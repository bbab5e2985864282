//! IPv4 layer
//!
//! Receives IPv4 frames from the Ethernet layer, keeps the ones addressed to
//! this host and fans them out by protocol number. Outbound packets get the
//! local source address, a fresh identification and a valid checksum before
//! the router picks the next-hop MAC.

use crate::demux::{Demux, Stream};
use crate::error::{Error, Result};
use crate::iface::ethernet::EthernetLayer;
use crate::iface::router::Router;
use crate::network::ethernet::{EtherType, Frame, ETHERNET_MTU};
use crate::network::ipv4::{Ipv4Address, Ipv4Packet};
use log::{debug, info, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct Ipv4Layer {
    address: Ipv4Address,
    ethernet: Arc<EthernetLayer>,
    router: Router,
    demux: Demux<u8, Ipv4Packet>,
    identification: AtomicU16,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Ipv4Layer {
    pub fn new(
        ethernet: Arc<EthernetLayer>,
        router: Router,
        address: Ipv4Address,
        queue_capacity: usize,
    ) -> Result<Arc<Self>> {
        let frames = ethernet.subscribe(EtherType::IPV4);
        let layer = Arc::new(Ipv4Layer {
            address,
            ethernet,
            router,
            demux: Demux::new(queue_capacity),
            identification: AtomicU16::new(rand::random()),
            receiver: Mutex::new(None),
        });

        let handle = {
            let layer = layer.clone();
            thread::Builder::new()
                .name("ipv4-rx".to_string())
                .spawn(move || layer.receive_all(frames))?
        };
        *layer.receiver.lock() = Some(handle);

        Ok(layer)
    }

    pub fn address(&self) -> Ipv4Address {
        self.address
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Inbound packets carrying `protocol`.
    pub fn subscribe(&self, protocol: u8) -> Stream<Ipv4Packet> {
        self.demux.subscribe(protocol)
    }

    /// Fill in the source, identification, total length and checksum of
    /// `packet` and send it to its next hop.
    ///
    /// Packets are never fragmented: anything larger than the Ethernet MTU
    /// fails with [`Error::PayloadTooLarge`].
    pub fn send(&self, mut packet: Ipv4Packet) -> Result<()> {
        packet.header.source = self.address;
        packet.header.identification = self.identification.fetch_add(1, Ordering::SeqCst);
        packet.update_total_length()?;
        let size = packet.header.total_length as usize;
        if size > ETHERNET_MTU {
            return Err(Error::PayloadTooLarge {
                size,
                limit: ETHERNET_MTU,
            });
        }
        packet.header.update_checksum();

        let destination = packet.header.destination;
        let mac = self.router.resolve(destination)?;
        trace!(
            "tx {} -> {} via {} proto {} id {}",
            packet.header.source,
            destination,
            mac,
            packet.header.protocol,
            packet.header.identification
        );

        self.ethernet
            .send(Frame::new(mac, EtherType::IPV4, packet.to_bytes()))
    }

    /// Wait for the receive thread to finish.
    pub fn join(&self) {
        if let Some(handle) = self.receiver.lock().take() {
            let _ = handle.join();
        }
    }

    fn is_for_us(&self, destination: Ipv4Address) -> bool {
        destination == self.address || self.router.is_broadcast(destination)
    }

    fn receive_all(&self, frames: Stream<Frame>) {
        for frame in frames.iter() {
            let packet = match Ipv4Packet::from_bytes(&frame.payload) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("Dropping IPv4 packet from {}: {}", frame.source, err);
                    continue;
                }
            };

            let header = &packet.header;
            if !self.is_for_us(header.destination) {
                trace!("Ignoring IPv4 packet for {}", header.destination);
                continue;
            }
            trace!(
                "rx {} -> {} proto {} ({} bytes)",
                header.source,
                header.destination,
                header.protocol,
                packet.payload.len()
            );

            let protocol = header.protocol;
            if self.demux.dispatch(&protocol, packet).is_err() {
                debug!("Unsupported protocol: {}", protocol);
            }
        }

        info!("IPv4 layer stopped");
        self.demux.close();
    }
}
