//! Network interface controller abstraction
//!
//! A NIC moves raw Ethernet frames (without FCS) in and out of the stack and
//! knows its own MAC address. The stack reads from a NIC on exactly one
//! thread.

use crate::error::{Error, Result};
use crate::network::ethernet::MacAddress;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub trait Nic: Send + Sync {
    /// Transmit one frame.
    fn send(&self, frame: Vec<u8>) -> Result<()>;

    /// Blocks until the next frame arrives. Once the NIC is closed, frames
    /// already received are still returned, then [`Error::NicClosed`].
    fn recv(&self) -> Result<Vec<u8>>;

    fn mac(&self) -> MacAddress;

    /// Stop the NIC. Calling it more than once has no further effect.
    fn close(&self);
}

enum Inbound {
    Frame(Vec<u8>),
    Close,
}

/// A NIC living entirely in memory.
///
/// The other end of the cable is the [`Wire`] returned by [`MemoryNic::new`]:
/// frames injected there are received by the stack, and frames the stack
/// sends come out of it.
pub struct MemoryNic {
    mac: MacAddress,
    inbound: Receiver<Inbound>,
    inbound_tx: Sender<Inbound>,
    outbound: Sender<Vec<u8>>,
    closed: AtomicBool,
    drained: AtomicBool,
}

/// The far end of a [`MemoryNic`].
pub struct Wire {
    inbound: Sender<Inbound>,
    outbound: Receiver<Vec<u8>>,
}

impl MemoryNic {
    pub fn new(mac: MacAddress) -> (MemoryNic, Wire) {
        let (inbound_tx, inbound_rx) = unbounded();
        let (outbound_tx, outbound_rx) = unbounded();

        let nic = MemoryNic {
            mac,
            inbound: inbound_rx,
            inbound_tx: inbound_tx.clone(),
            outbound: outbound_tx,
            closed: AtomicBool::new(false),
            drained: AtomicBool::new(false),
        };
        let wire = Wire {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (nic, wire)
    }
}

impl Nic for MemoryNic {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::NicClosed);
        }
        // Nobody listening on the wire is the same as an unplugged cable.
        let _ = self.outbound.send(frame);
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>> {
        if self.drained.load(Ordering::SeqCst) {
            return Err(Error::NicClosed);
        }
        match self.inbound.recv() {
            Ok(Inbound::Frame(frame)) => Ok(frame),
            Ok(Inbound::Close) | Err(_) => {
                self.drained.store(true, Ordering::SeqCst);
                Err(Error::NicClosed)
            }
        }
    }

    fn mac(&self) -> MacAddress {
        self.mac
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.inbound_tx.send(Inbound::Close);
        }
    }
}

impl Wire {
    /// Put a frame on the cable towards the stack.
    pub fn inject(&self, frame: Vec<u8>) {
        let _ = self.inbound.send(Inbound::Frame(frame));
    }

    /// Next frame sent by the stack, waiting up to `timeout`.
    pub fn next_frame(&self, timeout: Duration) -> Option<Vec<u8>> {
        self.outbound.recv_timeout(timeout).ok()
    }

    /// Next frame sent by the stack, if one is already waiting.
    pub fn try_next_frame(&self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }
}
