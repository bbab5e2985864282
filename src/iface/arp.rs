//! ARP resolver
//!
//! Maps IPv4 addresses on the local subnet to MAC addresses. Answers are
//! cached with a TTL. Concurrent resolutions of the same address share one
//! in-flight query: the first caller creates a pending record and spawns the
//! thread that broadcasts requests, later callers just wait on the record.

use crate::config::ArpConfig;
use crate::demux::Stream;
use crate::error::{Error, Result};
use crate::iface::ethernet::EthernetLayer;
use crate::network::arp::{ArpOperation, ArpPacket};
use crate::network::ethernet::{EtherType, Frame, MacAddress};
use crate::network::ipv4::Ipv4Address;
use log::{debug, info, trace, warn};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Resolution of IPv4 addresses to link-layer addresses.
pub trait AddressResolver: Send + Sync {
    /// Fails with [`Error::ArpTimeout`] when nobody answers.
    fn resolve(&self, address: Ipv4Address) -> Result<MacAddress>;
}

struct CacheEntry {
    mac: MacAddress,
    expires_at: Instant,
}

struct CacheState {
    entries: HashMap<Ipv4Address, CacheEntry>,
    next_sweep: Instant,
}

/// IP to MAC mappings that expire after a fixed TTL.
pub struct ArpCache {
    ttl: Duration,
    cleanup_interval: Duration,
    state: Mutex<CacheState>,
}

impl ArpCache {
    pub fn new(ttl: Duration, cleanup_interval: Duration) -> Self {
        ArpCache {
            ttl,
            cleanup_interval,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                next_sweep: Instant::now() + cleanup_interval,
            }),
        }
    }

    pub fn get(&self, address: Ipv4Address) -> Option<MacAddress> {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.sweep_if_due(&mut state, now);
        match state.entries.get(&address) {
            Some(entry) if entry.expires_at > now => Some(entry.mac),
            Some(_) => {
                state.entries.remove(&address);
                None
            }
            None => None,
        }
    }

    /// Insert or refresh a mapping with the default TTL.
    pub fn insert(&self, address: Ipv4Address, mac: MacAddress) {
        let now = Instant::now();
        let mut state = self.state.lock();
        self.sweep_if_due(&mut state, now);
        state.entries.insert(
            address,
            CacheEntry {
                mac,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every expired entry.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut state = self.state.lock();
        state.entries.retain(|_, entry| entry.expires_at > now);
        state.next_sweep = now + self.cleanup_interval;
    }

    fn sweep_if_due(&self, state: &mut CacheState, now: Instant) {
        if now >= state.next_sweep {
            state.entries.retain(|_, entry| entry.expires_at > now);
            state.next_sweep = now + self.cleanup_interval;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingState {
    Waiting,
    Replied,
    TimedOut,
}

/// An in-flight query. Leaves `Waiting` exactly once, either because a reply
/// arrived or because the retries ran out.
struct PendingRequest {
    state: Mutex<PendingState>,
    changed: Condvar,
}

impl PendingRequest {
    fn new() -> Self {
        PendingRequest {
            state: Mutex::new(PendingState::Waiting),
            changed: Condvar::new(),
        }
    }

    /// Returns false if the request was already settled.
    fn settle(&self, outcome: PendingState) -> bool {
        let mut state = self.state.lock();
        if *state != PendingState::Waiting {
            return false;
        }
        *state = outcome;
        self.changed.notify_all();
        true
    }

    fn got_reply(&self) -> bool {
        self.settle(PendingState::Replied)
    }

    fn timeout(&self) -> bool {
        self.settle(PendingState::TimedOut)
    }

    fn wait(&self) -> PendingState {
        let mut state = self.state.lock();
        while *state == PendingState::Waiting {
            self.changed.wait(&mut state);
        }
        *state
    }

    /// Wait at most `timeout` for a reply. True if one arrived.
    fn wait_reply_for(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while *state == PendingState::Waiting {
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        *state == PendingState::Replied
    }
}

struct Inner {
    mac: MacAddress,
    address: Ipv4Address,
    ethernet: Arc<EthernetLayer>,
    cache: ArpCache,
    query_interval: Duration,
    retries: u32,
    requests: RwLock<HashMap<Ipv4Address, Arc<PendingRequest>>>,
}

pub struct ArpResolver {
    inner: Arc<Inner>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl ArpResolver {
    /// Start answering and resolving ARP for `address` on `ethernet`.
    pub fn new(
        ethernet: Arc<EthernetLayer>,
        address: Ipv4Address,
        config: &ArpConfig,
    ) -> Result<Self> {
        let frames = ethernet.subscribe(EtherType::ARP);
        let inner = Arc::new(Inner {
            mac: ethernet.mac(),
            address,
            ethernet,
            cache: ArpCache::new(config.cache_ttl, config.cleanup_interval),
            query_interval: config.query_interval,
            retries: config.retries,
            requests: RwLock::new(HashMap::new()),
        });

        let handle = {
            let inner = inner.clone();
            thread::Builder::new()
                .name("arp-rx".to_string())
                .spawn(move || inner.receive_all(frames))?
        };

        Ok(ArpResolver {
            inner,
            receiver: Mutex::new(Some(handle)),
        })
    }

    pub fn cache(&self) -> &ArpCache {
        &self.inner.cache
    }

    /// Number of addresses with a query in flight.
    pub fn pending(&self) -> usize {
        self.inner.requests.read().len()
    }

    /// Wait for the receive thread to finish.
    pub fn join(&self) {
        if let Some(handle) = self.receiver.lock().take() {
            let _ = handle.join();
        }
    }
}

impl AddressResolver for ArpResolver {
    fn resolve(&self, address: Ipv4Address) -> Result<MacAddress> {
        if let Some(mac) = self.inner.cache.get(address) {
            return Ok(mac);
        }
        Inner::query(&self.inner, address)
    }
}

impl Inner {
    fn query(this: &Arc<Inner>, address: Ipv4Address) -> Result<MacAddress> {
        let existing = this.requests.read().get(&address).cloned();
        let (pending, created) = match existing {
            Some(pending) => (pending, false),
            None => {
                let mut requests = this.requests.write();
                match requests.get(&address) {
                    Some(pending) => (pending.clone(), false),
                    None => {
                        let pending = Arc::new(PendingRequest::new());
                        requests.insert(address, pending.clone());
                        Self::spawn_query(this, address, pending.clone());
                        (pending, true)
                    }
                }
            }
        };

        let outcome = pending.wait();

        if created {
            this.requests.write().remove(&address);
        }

        match this.cache.get(address) {
            Some(mac) => Ok(mac),
            None => {
                debug!("ARP resolution of {} failed ({:?})", address, outcome);
                Err(Error::ArpTimeout(address))
            }
        }
    }

    fn spawn_query(this: &Arc<Inner>, address: Ipv4Address, pending: Arc<PendingRequest>) {
        let inner = this.clone();
        let spawned = thread::Builder::new()
            .name(format!("arp-query-{}", address))
            .spawn({
                let pending = pending.clone();
                move || inner.send_requests(address, &pending)
            });
        if let Err(err) = spawned {
            warn!("Cannot start ARP query for {}: {}", address, err);
            pending.timeout();
        }
    }

    /// Broadcast up to `retries` requests, `query_interval` apart, stopping at
    /// the first reply.
    fn send_requests(&self, address: Ipv4Address, pending: &PendingRequest) {
        let payload = ArpPacket::request(self.mac, self.address, address).to_bytes();

        for attempt in 1..=self.retries {
            trace!("ARP request {}/{} for {}", attempt, self.retries, address);
            let frame = Frame::new(MacAddress::BROADCAST, EtherType::ARP, payload.clone());
            if let Err(err) = self.ethernet.send(frame) {
                warn!("Cannot send ARP request for {}: {}", address, err);
                break;
            }
            if pending.wait_reply_for(self.query_interval) {
                return;
            }
        }

        pending.timeout();
    }

    fn receive_all(&self, frames: Stream<Frame>) {
        for frame in frames.iter() {
            let packet = match ArpPacket::from_bytes(&frame.payload) {
                Ok(packet) => packet,
                Err(err) => {
                    debug!("Dropping ARP packet: {}", err);
                    continue;
                }
            };

            match packet.operation {
                ArpOperation::Request => self.handle_request(&packet),
                ArpOperation::Reply => self.handle_reply(&packet),
                ArpOperation::Unknown(op) => {
                    debug!("Dropping ARP packet with unknown operation {}", op)
                }
            }
        }
        info!("ARP resolver stopped");
    }

    fn handle_request(&self, request: &ArpPacket) {
        if request.target_ip != self.address {
            return;
        }
        trace!("ARP who-has {} from {}", request.target_ip, request.sender_ip);

        let reply = ArpPacket::reply(self.mac, self.address, request.sender_mac, request.sender_ip);
        let frame = Frame::new(request.sender_mac, EtherType::ARP, reply.to_bytes());
        if let Err(err) = self.ethernet.send(frame) {
            warn!("Cannot send ARP reply to {}: {}", request.sender_ip, err);
        }
    }

    fn handle_reply(&self, reply: &ArpPacket) {
        trace!("ARP {} is-at {}", reply.sender_ip, reply.sender_mac);
        self.cache.insert(reply.sender_ip, reply.sender_mac);

        if let Some(pending) = self.requests.read().get(&reply.sender_ip) {
            pending.got_reply();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_expiry() {
        let cache = ArpCache::new(Duration::from_millis(20), Duration::from_secs(3600));
        let ip = Ipv4Address::new(10, 0, 0, 2);
        let mac = MacAddress([0xAA; 6]);

        cache.insert(ip, mac);
        assert_eq!(cache.get(ip), Some(mac));

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(ip), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_sweep() {
        let cache = ArpCache::new(Duration::from_millis(10), Duration::from_secs(3600));
        cache.insert(Ipv4Address::new(10, 0, 0, 2), MacAddress([0xAA; 6]));
        cache.insert(Ipv4Address::new(10, 0, 0, 3), MacAddress([0xBB; 6]));
        assert_eq!(cache.len(), 2);

        thread::sleep(Duration::from_millis(30));
        cache.sweep();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_pending_settles_once() {
        let pending = PendingRequest::new();
        assert!(pending.got_reply());
        assert!(!pending.got_reply());
        assert!(!pending.timeout());
        assert_eq!(pending.wait(), PendingState::Replied);
        assert!(pending.wait_reply_for(Duration::from_millis(1)));
    }

    #[test]
    fn test_pending_wait_times_out() {
        let pending = PendingRequest::new();
        assert!(!pending.wait_reply_for(Duration::from_millis(10)));
        assert!(pending.timeout());
        assert_eq!(pending.wait(), PendingState::TimedOut);
    }

    #[test]
    fn test_pending_wakes_waiters() {
        let pending = Arc::new(PendingRequest::new());
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let pending = pending.clone();
                thread::spawn(move || pending.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(10));
        pending.got_reply();
        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), PendingState::Replied);
        }
    }
}
