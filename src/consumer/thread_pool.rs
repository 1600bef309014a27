//! `ThreadPoolConsumer` — a fixed-size in-process worker pool pulling
//! raw carriers from the broker.
//!
//! Each worker repeatedly polls the broker with a short timeout and
//! processes whatever it gets in place. On shutdown, in-flight items
//! are allowed to finish; anything still queued in the broker is left
//! there (dropped from this consumer's perspective). Thread lifecycle
//! (shutdown flag + join-on-drop) follows `src/hub/workers.rs`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, warn};

use crate::broker::engine::Broker;
use crate::carrier::Carrier;
use crate::error::BrokerError;
use crate::individual::Operators;

use super::Consumer;

const POLL_TIMEOUT: Duration = Duration::from_millis(20);
const PUT_TIMEOUT: Duration = Duration::from_millis(20);

/// A fixed-size pool of worker threads processing carriers pulled from
/// a shared broker.
pub struct ThreadPoolConsumer {
    broker: Arc<Broker<Carrier>>,
    operators: Operators,
    pool_size: usize,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPoolConsumer {
    pub fn new(broker: Arc<Broker<Carrier>>, operators: Operators, pool_size: usize) -> Arc<Self> {
        Arc::new(Self {
            broker,
            operators,
            pool_size: pool_size.max(1),
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::new()),
        })
    }

    fn worker_loop(broker: Arc<Broker<Carrier>>, operators: Operators, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            match broker.get(POLL_TIMEOUT) {
                Ok((id, mut carrier)) => {
                    carrier.process(&operators);
                    if let Err(e) = broker.put(id, carrier, PUT_TIMEOUT) {
                        warn!("thread pool worker: failed to return result for port {id}: {e}");
                    }
                }
                Err(BrokerError::TimedOut) => continue,
                Err(e) => {
                    error!("thread pool worker: unrecoverable broker error: {e}");
                    break;
                }
            }
        }
    }
}

impl Consumer for ThreadPoolConsumer {
    fn start(&self) {
        let mut handles = self.handles.lock().expect("thread pool handles mutex poisoned");
        if !handles.is_empty() {
            return; // already started
        }
        for _ in 0..self.pool_size {
            let broker = Arc::clone(&self.broker);
            let operators = self.operators.clone();
            let shutdown = Arc::clone(&self.shutdown);
            handles.push(thread::spawn(move || {
                Self::worker_loop(broker, operators, shutdown);
            }));
        }
    }

    fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let mut handles = self.handles.lock().expect("thread pool handles mutex poisoned");
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for ThreadPoolConsumer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPort;
    use crate::carrier::Command;
    use crate::individual::{FitnessFunction, Individual, ParameterAdaptor, Payload, Role};
    use std::time::Duration as StdDuration;

    #[derive(Debug)]
    struct Identity;
    impl ParameterAdaptor for Identity {
        fn mutate_doubles(&self, _values: &mut [f64]) {}
    }
    #[derive(Debug)]
    struct SumOfSquares;
    impl FitnessFunction for SumOfSquares {
        fn evaluate(&self, payload: &Payload) -> f64 {
            match payload {
                Payload::DoubleVec(v) => v.iter().map(|x| x * x).sum(),
                _ => 0.0,
            }
        }
    }

    fn operators() -> Operators {
        Operators {
            adaptor: Arc::new(Identity),
            fitness: Arc::new(SumOfSquares),
            maximize: false,
        }
    }

    #[test]
    fn test_pool_processes_and_returns_items() {
        let broker: Arc<Broker<Carrier>> = Broker::new();
        let port = Arc::new(BufferPort::new());
        let id = broker.enrol(Arc::clone(&port)).unwrap();

        let ind = Individual::new(Payload::DoubleVec(vec![3.0, 4.0]), Role::Child);
        port.raw.push_front(Carrier::new(Command::Evaluate, 0, id, ind));

        let pool = ThreadPoolConsumer::new(Arc::clone(&broker), operators(), 2);
        pool.start();

        let result = port.processed.pop_back_timeout(StdDuration::from_millis(500)).unwrap();
        assert_eq!(result.individual.cached_fitness(), 25.0);

        pool.shutdown();
    }

    #[test]
    fn test_shutdown_joins_workers() {
        let broker: Arc<Broker<Carrier>> = Broker::new();
        let pool = ThreadPoolConsumer::new(broker, operators(), 3);
        pool.start();
        pool.shutdown();
        assert!(pool.handles.lock().unwrap().is_empty());
    }
}
