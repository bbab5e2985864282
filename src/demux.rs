//! Demultiplexing of inbound packets by protocol discriminant.
//!
//! Every layer owns a [`Demux`] keyed by the field that selects the next layer
//! up: the EtherType for Ethernet, the protocol number for IPv4, the
//! destination port for UDP. Subscribers get a [`Stream`] fed by a bounded
//! channel, so a slow subscriber slows down the layer that feeds it.
//!
//! The demux only keeps the sending half of each route. Once every handle of
//! a stream is dropped the route is dead: items for it are dropped and the
//! next `subscribe` for that key opens a fresh stream.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Inbound queue of one subscription.
///
/// Cloning a stream yields another handle to the same queue; each item is
/// received by exactly one handle. Handles never block each other.
#[derive(Debug)]
pub struct Stream<T> {
    rx: Arc<Receiver<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            rx: self.rx.clone(),
        }
    }
}

impl<T> Stream<T> {
    /// Blocks until the next item arrives. Returns `None` once the layer
    /// feeding this stream has shut down and the queue is drained.
    pub fn recv(&self) -> Option<T> {
        self.rx.recv().ok()
    }

    /// Like [`Stream::recv`] but gives up after `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.rx.try_recv()
    }

    /// Iterate until the stream is closed.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.iter()
    }
}

struct Route<T> {
    tx: Sender<T>,
    rx: Weak<Receiver<T>>,
}

impl<T> Route<T> {
    fn is_alive(&self) -> bool {
        self.rx.strong_count() > 0
    }
}

struct Routes<K, T> {
    routes: HashMap<K, Route<T>>,
    closed: bool,
}

/// Map from discriminant to subscriber stream.
pub struct Demux<K, T> {
    capacity: usize,
    inner: RwLock<Routes<K, T>>,
}

impl<K: Eq + Hash, T> Demux<K, T> {
    /// `capacity` bounds every subscriber queue.
    pub fn new(capacity: usize) -> Self {
        Demux {
            capacity,
            inner: RwLock::new(Routes {
                routes: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Stream for `key`, created on first use. While any handle of it is
    /// alive, repeated calls for the same key return handles to the same
    /// stream. On a closed demux the returned stream is already closed.
    pub fn subscribe(&self, key: K) -> Stream<T> {
        if let Some(rx) = self.inner.read().routes.get(&key).and_then(|r| r.rx.upgrade()) {
            return Stream { rx };
        }

        let mut inner = self.inner.write();
        if let Some(rx) = inner.routes.get(&key).and_then(|r| r.rx.upgrade()) {
            return Stream { rx };
        }

        let (tx, rx) = bounded(self.capacity);
        let rx = Arc::new(rx);
        if !inner.closed {
            inner.routes.insert(
                key,
                Route {
                    tx,
                    rx: Arc::downgrade(&rx),
                },
            );
        }
        Stream { rx }
    }

    /// True if `key` has a live subscriber.
    pub fn is_subscribed(&self, key: &K) -> bool {
        self.inner
            .read()
            .routes
            .get(key)
            .map_or(false, Route::is_alive)
    }

    /// Hand `item` to the subscriber for `key`, blocking while its queue is
    /// full. The item comes back as `Err` when nobody subscribed to `key` or
    /// every handle of its stream has been dropped.
    pub fn dispatch(&self, key: &K, item: T) -> Result<(), T> {
        let tx = match self.inner.read().routes.get(key) {
            Some(route) => route.tx.clone(),
            None => return Err(item),
        };

        let item = match tx.try_send(item) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(item)) => match tx.send(item) {
                Ok(()) => return Ok(()),
                Err(err) => err.into_inner(),
            },
            Err(TrySendError::Disconnected(item)) => item,
        };

        let mut inner = self.inner.write();
        if let Some(route) = inner.routes.get(key) {
            if route.tx.same_channel(&tx) {
                inner.routes.remove(key);
            }
        }
        Err(item)
    }

    /// Drop every route, closing all streams once they are drained.
    pub fn close(&self) {
        let mut inner = self.inner.write();
        inner.closed = true;
        inner.routes.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_subscribe_is_idempotent() {
        let demux: Demux<u16, u32> = Demux::new(4);
        let a = demux.subscribe(7);
        let b = demux.subscribe(7);

        demux.dispatch(&7, 1).unwrap();
        demux.dispatch(&7, 2).unwrap();
        assert_eq!(b.recv(), Some(1));
        assert_eq!(a.recv(), Some(2));
    }

    #[test]
    fn test_unsubscribed_key_is_returned() {
        let demux: Demux<u16, u32> = Demux::new(4);
        let _stream = demux.subscribe(7);
        assert_eq!(demux.dispatch(&8, 5), Err(5));
    }

    #[test]
    fn test_each_item_reaches_one_subscriber() {
        let demux: Demux<u8, u8> = Demux::new(4);
        let one = demux.subscribe(1);
        let two = demux.subscribe(2);

        demux.dispatch(&1, 10).unwrap();
        assert_eq!(one.try_recv(), Ok(10));
        assert_eq!(two.try_recv(), Err(TryRecvError::Empty));
    }

    #[test]
    fn test_close_drains_then_ends() {
        let demux: Demux<u8, u8> = Demux::new(4);
        let stream = demux.subscribe(1);
        demux.dispatch(&1, 1).unwrap();
        demux.dispatch(&1, 2).unwrap();
        demux.close();

        assert_eq!(stream.iter().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(stream.recv(), None);
        assert!(demux.is_closed());
    }

    #[test]
    fn test_subscribe_after_close() {
        let demux: Demux<u8, u8> = Demux::new(4);
        demux.close();
        let stream = demux.subscribe(1);
        assert_eq!(stream.recv(), None);
        assert!(!demux.is_subscribed(&1));
    }

    #[test]
    fn test_full_queue_blocks_until_read() {
        let demux: Arc<Demux<u8, u8>> = Arc::new(Demux::new(1));
        let stream = demux.subscribe(1);
        demux.dispatch(&1, 1).unwrap();

        let producer = {
            let demux = demux.clone();
            thread::spawn(move || demux.dispatch(&1, 2))
        };
        assert_eq!(stream.recv(), Some(1));
        assert_eq!(stream.recv_timeout(Duration::from_secs(5)), Ok(2));
        assert_eq!(producer.join().unwrap(), Ok(()));
    }

    #[test]
    fn test_dropped_stream_is_unrouted() {
        let demux: Demux<u8, u8> = Demux::new(1);
        let stream = demux.subscribe(1);
        demux.dispatch(&1, 1).unwrap();
        drop(stream);

        assert!(!demux.is_subscribed(&1));
        assert_eq!(demux.dispatch(&1, 2), Err(2));
        assert_eq!(demux.dispatch(&1, 3), Err(3));

        let stream = demux.subscribe(1);
        assert!(demux.is_subscribed(&1));
        demux.dispatch(&1, 4).unwrap();
        assert_eq!(stream.try_recv(), Ok(4));
    }

    #[test]
    fn test_blocked_dispatch_ends_when_subscriber_dies() {
        let demux: Arc<Demux<u8, u8>> = Arc::new(Demux::new(1));
        let stream = demux.subscribe(1);
        demux.dispatch(&1, 1).unwrap();

        let producer = {
            let demux = demux.clone();
            thread::spawn(move || demux.dispatch(&1, 2))
        };
        thread::sleep(Duration::from_millis(50));
        drop(stream);

        assert_eq!(producer.join().unwrap(), Err(2));
        assert!(!demux.is_subscribed(&1));
    }

    #[test]
    fn test_handles_do_not_block_each_other() {
        let demux: Demux<u8, u8> = Demux::new(4);
        let blocked = demux.subscribe(1);
        let other = demux.subscribe(1);

        let reader = thread::spawn(move || blocked.recv());
        thread::sleep(Duration::from_millis(50));

        assert_eq!(other.try_recv(), Err(TryRecvError::Empty));
        assert_eq!(
            other.recv_timeout(Duration::from_millis(50)),
            Err(RecvTimeoutError::Timeout)
        );

        demux.dispatch(&1, 9).unwrap();
        assert_eq!(reader.join().unwrap(), Some(9));
    }
}
