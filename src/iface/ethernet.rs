//! Ethernet layer
//!
//! Owns the receive side of the NIC: one thread decodes every inbound frame
//! and hands it to the subscriber registered for its EtherType. Outbound
//! frames get the local MAC as source and go straight to the NIC.

use crate::config::UnknownFrames;
use crate::demux::{Demux, Stream};
use crate::error::{Error, Result};
use crate::iface::nic::Nic;
use crate::network::ethernet::{EtherType, Frame, MacAddress, ETHERNET_MTU};
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct EthernetLayer {
    nic: Arc<dyn Nic>,
    mac: MacAddress,
    demux: Demux<EtherType, Frame>,
    unknown_frames: UnknownFrames,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl EthernetLayer {
    /// Start reading frames from `nic`.
    pub fn new(
        nic: Arc<dyn Nic>,
        queue_capacity: usize,
        unknown_frames: UnknownFrames,
    ) -> Result<Arc<Self>> {
        let layer = Arc::new(EthernetLayer {
            mac: nic.mac(),
            nic,
            demux: Demux::new(queue_capacity),
            unknown_frames,
            receiver: Mutex::new(None),
        });

        let handle = {
            let layer = layer.clone();
            thread::Builder::new()
                .name("ethernet-rx".to_string())
                .spawn(move || layer.receive_all())?
        };
        *layer.receiver.lock() = Some(handle);

        Ok(layer)
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    /// Inbound frames carrying `ether_type`.
    ///
    /// # Panics
    ///
    /// Panics if `ether_type` is a payload length (<= 1500) rather than an
    /// EtherType.
    pub fn subscribe(&self, ether_type: EtherType) -> Stream<Frame> {
        assert!(
            !ether_type.is_length(),
            "must be a true EtherType, not a payload length: {}",
            ether_type
        );
        self.demux.subscribe(ether_type)
    }

    /// Send `frame` with the local MAC as its source. Payloads above the
    /// MTU fail with [`Error::PayloadTooLarge`].
    pub fn send(&self, mut frame: Frame) -> Result<()> {
        if frame.payload.len() > ETHERNET_MTU {
            return Err(Error::PayloadTooLarge {
                size: frame.payload.len(),
                limit: ETHERNET_MTU,
            });
        }
        frame.source = self.mac;
        trace!(
            "tx {} -> {} type {} ({} bytes)",
            frame.source,
            frame.destination,
            frame.ether_type,
            frame.payload.len()
        );
        self.nic.send(frame.to_bytes())
    }

    /// Close the NIC. The receive thread finishes once the NIC is drained,
    /// closing every subscriber stream.
    pub fn close(&self) {
        self.nic.close();
    }

    /// Wait for the receive thread to finish.
    pub fn join(&self) {
        if let Some(handle) = self.receiver.lock().take() {
            let _ = handle.join();
        }
    }

    fn receive_all(&self) {
        loop {
            let bytes = match self.nic.recv() {
                Ok(bytes) => bytes,
                Err(Error::NicClosed) => break,
                Err(err) => {
                    warn!("Ethernet receive failed: {}", err);
                    break;
                }
            };

            let frame = match Frame::from_bytes(&bytes) {
                Ok(frame) => frame,
                Err(err) => {
                    debug!("Dropping Ethernet frame: {}", err);
                    continue;
                }
            };
            trace!(
                "rx {} -> {} type {} ({} bytes)",
                frame.source,
                frame.destination,
                frame.ether_type,
                frame.payload.len()
            );

            let ether_type = frame.ether_type;
            let undelivered = if ether_type.is_length() {
                Err(frame)
            } else {
                self.demux.dispatch(&ether_type, frame)
            };
            if let Err(frame) = undelivered {
                self.unknown_frame(frame);
            }
        }

        info!("Ethernet layer stopped");
        self.demux.close();
    }

    fn unknown_frame(&self, frame: Frame) {
        match self.unknown_frames {
            UnknownFrames::Discard => {}
            UnknownFrames::Log => info!(
                "Received an Ethernet frame nobody subscribed to: {} -> {} type {} ({} bytes)",
                frame.source,
                frame.destination,
                frame.ether_type,
                frame.payload.len()
            ),
        }
    }
}
