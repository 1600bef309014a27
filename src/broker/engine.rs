//! `Broker<T>` — the round-robin mediator between producers (populations)
//! and consumers (thread-pool workers, networked clients).
//!
//! A broker owns a collection of `BufferPort<T>`, each identified by a
//! `u64` port id assigned at enrollment. `get()` round-robins across the
//! raw halves of every live port to hand a consumer its next item to
//! process; `put()` routes a finished item back to the processed half of
//! the port it originated from, silently discarding it if that port has
//! since been dropped (see [`Broker::dropped_put_count`]).
//!
//! Locking discipline and the orphan-reclamation sweep on `enrol()` are
//! grounded directly on the original engine's broker: raw and processed
//! collections are guarded independently, and a port is only removed
//! once nothing besides the broker's own table still holds an `Arc` to
//! it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::buffer::BufferPort;
use crate::constants::MAX_PORT_ID;
use crate::error::BrokerError;

struct RawOrder {
    order: Vec<u64>,
    cursor: usize,
}

/// Round-robin mediator owning every enrolled `BufferPort<T>`.
///
/// Ports live in a single table (`ports`); `raw_order` only tracks which
/// ids are round-robin candidates and in what order. Keeping exactly one
/// `Arc` per enrolled port on the broker side (rather than one per
/// raw/processed collection) is what makes `Arc::strong_count` a reliable
/// orphan signal during the `enrol()` sweep: once a caller drops its own
/// handle, the broker's table entry is the last owner left.
pub struct Broker<T> {
    next_id: AtomicU64,
    ports: Mutex<HashMap<u64, Arc<BufferPort<T>>>>,
    raw_order: Mutex<RawOrder>,
    dropped_puts: AtomicU64,
}

impl<T> Broker<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(0),
            ports: Mutex::new(HashMap::new()),
            raw_order: Mutex::new(RawOrder {
                order: Vec::new(),
                cursor: 0,
            }),
            dropped_puts: AtomicU64::new(0),
        })
    }

    /// Registers `port` with the broker, assigning it a fresh id and
    /// sweeping out any previously-enrolled ports that nothing but this
    /// table still references (the orphan-reclamation pass).
    pub fn enrol(&self, port: Arc<BufferPort<T>>) -> Result<u64, BrokerError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if id >= MAX_PORT_ID {
            return Err(BrokerError::MaxPortIdExceeded(MAX_PORT_ID));
        }
        port.set_id(id);

        let mut ports = self.ports.lock().expect("broker ports mutex poisoned");
        ports.retain(|_, p| Arc::strong_count(p) > 1);
        ports.insert(id, port);

        let mut raw = self.raw_order.lock().expect("broker raw order mutex poisoned");
        raw.order.retain(|pid| ports.contains_key(pid));
        raw.order.push(id);
        if raw.cursor >= raw.order.len() {
            raw.cursor = 0;
        }

        Ok(id)
    }

    /// Hands back the next item to process, round-robining across every
    /// live port's raw half, along with the id it came from.
    pub fn get(&self, timeout: Duration) -> Result<(u64, T), BrokerError> {
        let id = {
            let mut raw = self.raw_order.lock().expect("broker raw order mutex poisoned");
            if raw.order.is_empty() {
                return Err(BrokerError::TimedOut);
            }
            if raw.cursor >= raw.order.len() {
                raw.cursor = 0;
            }
            let id = raw.order[raw.cursor];
            raw.cursor = (raw.cursor + 1) % raw.order.len();
            id
        };

        let port = {
            let ports = self.ports.lock().expect("broker ports mutex poisoned");
            ports.get(&id).cloned()
        };
        let Some(port) = port else {
            return Err(BrokerError::TimedOut);
        };
        let item = port.raw.pop_back_timeout(timeout)?;
        Ok((id, item))
    }

    /// Routes `item` back to the processed half of port `id`. If `id`
    /// has since been dropped from the table the item is silently
    /// discarded and [`Broker::dropped_put_count`] ticks up, matching
    /// the original engine's behavior.
    pub fn put(&self, id: u64, item: T, timeout: Duration) -> Result<(), BrokerError> {
        let port = {
            let ports = self.ports.lock().expect("broker ports mutex poisoned");
            ports.get(&id).cloned()
        };

        match port {
            Some(port) => port.processed.push_front_timeout(item, timeout).map_err(Into::into),
            None => {
                self.dropped_puts.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    /// Number of puts silently discarded because their target port had
    /// already been reclaimed.
    pub fn dropped_put_count(&self) -> u64 {
        self.dropped_puts.load(Ordering::SeqCst)
    }

    /// Number of ports currently live in the table.
    pub fn live_port_count(&self) -> usize {
        self.ports.lock().expect("broker ports mutex poisoned").len()
    }

    /// Total items queued across every live raw buffer.
    pub fn raw_queue_count(&self) -> usize {
        self.ports
            .lock()
            .expect("broker ports mutex poisoned")
            .values()
            .map(|p| p.raw.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrol_assigns_increasing_ids() {
        let broker: Arc<Broker<i32>> = Broker::new();
        let p1 = Arc::new(BufferPort::new());
        let p2 = Arc::new(BufferPort::new());
        let id1 = broker.enrol(p1).unwrap();
        let id2 = broker.enrol(p2).unwrap();
        assert!(id2 > id1);
    }

    #[test]
    fn test_get_round_robins_across_ports() {
        let broker: Arc<Broker<i32>> = Broker::new();
        let p1 = Arc::new(BufferPort::new());
        let p2 = Arc::new(BufferPort::new());
        p1.raw.push_front(1);
        p2.raw.push_front(2);
        let id1 = broker.enrol(Arc::clone(&p1)).unwrap();
        let id2 = broker.enrol(Arc::clone(&p2)).unwrap();

        let (got_id1, _) = broker.get(Duration::from_millis(50)).unwrap();
        let (got_id2, _) = broker.get(Duration::from_millis(50)).unwrap();
        assert_ne!(got_id1, got_id2);
        assert!([id1, id2].contains(&got_id1));
        assert!([id1, id2].contains(&got_id2));
    }

    #[test]
    fn test_put_routes_to_originating_port() {
        let broker: Arc<Broker<i32>> = Broker::new();
        let port = Arc::new(BufferPort::new());
        let id = broker.enrol(Arc::clone(&port)).unwrap();
        broker.put(id, 42, Duration::from_millis(50)).unwrap();
        assert_eq!(port.processed.pop_back(), 42);
    }

    #[test]
    fn test_put_to_missing_port_is_silently_dropped() {
        let broker: Arc<Broker<i32>> = Broker::new();
        assert_eq!(broker.dropped_put_count(), 0);
        broker.put(999, 1, Duration::from_millis(10)).unwrap();
        assert_eq!(broker.dropped_put_count(), 1);
    }

    #[test]
    fn test_get_with_no_ports_times_out() {
        let broker: Arc<Broker<i32>> = Broker::new();
        let err = broker.get(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, BrokerError::TimedOut));
    }

    #[test]
    fn test_enrol_sweeps_orphaned_ports() {
        let broker: Arc<Broker<i32>> = Broker::new();
        {
            let port = Arc::new(BufferPort::new());
            broker.enrol(port).unwrap();
            // `port` drops here; the broker's own Arc is the only owner left.
        }
        assert_eq!(broker.live_port_count(), 1);
        let port2 = Arc::new(BufferPort::new());
        broker.enrol(port2).unwrap();
        assert_eq!(broker.live_port_count(), 1);
    }

    #[test]
    fn test_live_and_raw_queue_counts() {
        let broker: Arc<Broker<i32>> = Broker::new();
        let port = Arc::new(BufferPort::new());
        port.raw.push_front(1);
        port.raw.push_front(2);
        broker.enrol(Arc::clone(&port)).unwrap();
        assert_eq!(broker.live_port_count(), 1);
        assert_eq!(broker.raw_queue_count(), 2);
    }
}
