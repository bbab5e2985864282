//! Linux TAP device as a NIC.
//!
//! The stack behaves as a separate host plugged into the TAP device, so the
//! MAC address is chosen by the caller rather than read from the kernel.
//!
//! Note: Root/sudo privileges (or CAP_NET_ADMIN) are required to create the
//! device.

use crate::error::{Error, Result};
use crate::iface::nic::Nic;
use crate::network::ethernet::{MacAddress, ETHERNET_HEADER_LEN, ETHERNET_MTU};
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use tun_tap::{Iface, Mode};

/// Room for a full frame plus an 802.1Q tag.
const RECV_BUFFER_LEN: usize = ETHERNET_HEADER_LEN + ETHERNET_MTU + 4;

pub struct TapNic {
    iface: Iface,
    mac: MacAddress,
    closed: AtomicBool,
}

impl TapNic {
    /// Create (or attach to) the TAP interface `name`, without packet info.
    pub fn open(name: &str, mac: MacAddress) -> Result<Self> {
        let iface = Iface::without_packet_info(name, Mode::Tap)?;
        info!("TAP device {} opened, stack MAC {}", iface.name(), mac);
        Ok(TapNic {
            iface,
            mac,
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        self.iface.name()
    }
}

impl Nic for TapNic {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::NicClosed);
        }
        self.iface.send(&frame)?;
        Ok(())
    }

    /// A read already blocked in the kernel is not interrupted by
    /// [`Nic::close`]; it returns after the next frame arrives.
    fn recv(&self) -> Result<Vec<u8>> {
        let mut buf = [0u8; RECV_BUFFER_LEN];
        loop {
            if self.closed.load(Ordering::SeqCst) {
                return Err(Error::NicClosed);
            }
            let nbytes = self.iface.recv(&mut buf)?;
            if nbytes == 0 {
                continue;
            }
            debug!("{}: received {} bytes", self.iface.name(), nbytes);
            return Ok(buf[..nbytes].to_vec());
        }
    }

    fn mac(&self) -> MacAddress {
        self.mac
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            info!("TAP device {} closed", self.iface.name());
        }
    }
}
