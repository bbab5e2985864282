//! Run the stack on a TAP device: answer pings and echo UDP datagrams on
//! port 7.
//!
//! ```text
//! sudo cargo run --example udp_echo -- tap0 10.0.0.1/24 10.0.0.254/24
//! ping 10.0.0.1
//! nc -u 10.0.0.1 7
//! ```

mod utils;

use std::env;
use std::sync::Arc;

use log::{info, warn};
use toy_tcpip::{MacAddress, Result, Stack, StackConfig, TapNic, UdpPacket};
use utils::network::configure_interface;

const ECHO_PORT: u16 = 7;
const STACK_MAC: MacAddress = MacAddress([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]);

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let tap_name = args.next().unwrap_or_else(|| "tap0".to_string());
    let stack_cidr = args.next().unwrap_or_else(|| "10.0.0.1/24".to_string());
    let host_cidr = args.next().unwrap_or_else(|| "10.0.0.254/24".to_string());

    let nic = TapNic::open(&tap_name, STACK_MAC)?;
    configure_interface(nic.name(), &host_cidr)?;

    let stack = Stack::new(Arc::new(nic), StackConfig::from_cidr(&stack_cidr)?)?;
    let datagrams = stack.udp().subscribe(ECHO_PORT);
    info!("Echoing UDP on {}:{}", stack.address(), ECHO_PORT);

    for datagram in datagrams.iter() {
        info!(
            "{} bytes from {}:{}",
            datagram.payload.len(),
            datagram.address,
            datagram.src_port()
        );
        let reply = UdpPacket::new(
            datagram.address,
            ECHO_PORT,
            datagram.src_port(),
            datagram.payload,
        );
        if let Err(err) = stack.udp().send(reply) {
            warn!("Echo to {} failed: {}", datagram.address, err);
        }
    }

    stack.shutdown();
    Ok(())
}
