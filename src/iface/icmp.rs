//! ICMP echo responder
//!
//! Answers every echo request addressed to the host. Any other ICMP message
//! is handed to whoever subscribed to its type.

use crate::demux::{Demux, Stream};
use crate::error::Result;
use crate::iface::ipv4::Ipv4Layer;
use crate::network::icmp::{IcmpMessage, IcmpPacket};
use crate::network::ipv4::{protocol, Ipv4Address, Ipv4Packet};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// An ICMP message together with the host that sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcmpDatagram {
    pub source: Ipv4Address,
    pub packet: IcmpPacket,
}

pub struct IcmpLayer {
    ipv4: Arc<Ipv4Layer>,
    demux: Demux<u8, IcmpDatagram>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl IcmpLayer {
    pub fn new(ipv4: Arc<Ipv4Layer>, queue_capacity: usize) -> Result<Arc<Self>> {
        let packets = ipv4.subscribe(protocol::ICMP);
        let layer = Arc::new(IcmpLayer {
            ipv4,
            demux: Demux::new(queue_capacity),
            receiver: Mutex::new(None),
        });

        let handle = {
            let layer = layer.clone();
            thread::Builder::new()
                .name("icmp-rx".to_string())
                .spawn(move || layer.receive_all(packets))?
        };
        *layer.receiver.lock() = Some(handle);

        Ok(layer)
    }

    /// Inbound messages of type `msg_type`. Echo requests are answered by the
    /// layer itself and never show up here.
    pub fn subscribe(&self, msg_type: u8) -> Stream<IcmpDatagram> {
        self.demux.subscribe(msg_type)
    }

    /// Send an echo request to `destination`.
    pub fn ping(
        &self,
        destination: Ipv4Address,
        identifier: u16,
        sequence: u16,
        payload: Vec<u8>,
    ) -> Result<()> {
        let request = IcmpPacket::echo_request(identifier, sequence, payload);
        self.ipv4
            .send(Ipv4Packet::new_to(destination, protocol::ICMP, request.to_bytes()))
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
            let packet = match IcmpPacket::from_bytes(&ip_packet.payload) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("Dropping ICMP packet from {}: {}", source, err);
                    continue;
                }
            };

            match packet.message {
                IcmpMessage::EchoRequest(echo) => {
                    debug!(
                        "Echo request from {} id={} seq={}",
                        source, echo.identifier, echo.sequence
                    );
                    let reply =
                        IcmpPacket::echo_reply(echo.identifier, echo.sequence, echo.payload);
                    let result = self
                        .ipv4
                        .send(Ipv4Packet::new_to(source, protocol::ICMP, reply.to_bytes()));
                    if let Err(err) = result {
                        warn!("Cannot send echo reply to {}: {}", source, err);
                    }
                }
                _ => {
                    let msg_type = packet.msg_type();
                    if self
                        .demux
                        .dispatch(&msg_type, IcmpDatagram { source, packet })
                        .is_err()
                    {
                        debug!("Unsupported ICMP type: {}", msg_type);
                    }
                }
            }
        }

        info!("ICMP layer stopped");
        self.demux.close();
    }
}
